use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info};

use crate::error::DataError;

const UP_SUFFIX: &str = "_up.sql";
const DOWN_SUFFIX: &str = "_down.sql";

/// One logical migration: an `_up.sql`/`_down.sql` pair, or a standalone
/// `.sql` file treated as an irreversible patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub name: String,
    pub patch: String,
    pub revert_patch: Option<String>,
}

/// Persistent row mirroring [`MigrationFile`] plus application state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub name: String,
    pub patch: String,
    pub revert_patch: Option<String>,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Scan `dir` for `*.sql` files, pairing `_up.sql`/`_down.sql` by shared
/// base name, and returns one [`MigrationFile`] per base name sorted
/// lexicographically.
pub fn scan_migrations(dir: &Path) -> Result<Vec<MigrationFile>, DataError> {
    let mut ups: BTreeMap<String, String> = BTreeMap::new();
    let mut downs: BTreeMap<String, String> = BTreeMap::new();
    let mut plain: BTreeMap<String, String> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let file_name = match path.file_name().and_then(|f| f.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let contents = std::fs::read_to_string(&path)?;

        if let Some(base) = file_name.strip_suffix(UP_SUFFIX) {
            ups.insert(base.to_string(), contents);
        } else if let Some(base) = file_name.strip_suffix(DOWN_SUFFIX) {
            downs.insert(base.to_string(), contents);
        } else if let Some(base) = file_name.strip_suffix(".sql") {
            plain.insert(base.to_string(), contents);
        }
    }

    let mut names: Vec<&String> = ups.keys().chain(plain.keys()).collect();
    names.sort();
    names.dedup();

    let migrations = names
        .into_iter()
        .filter_map(|name| {
            if let Some(patch) = ups.get(name) {
                Some(MigrationFile {
                    name: name.clone(),
                    patch: patch.clone(),
                    revert_patch: downs.get(name).cloned(),
                })
            } else {
                plain.get(name).map(|patch| MigrationFile {
                    name: name.clone(),
                    patch: patch.clone(),
                    revert_patch: None,
                })
            }
        })
        .collect();

    Ok(migrations)
}

async fn ensure_migrations_table(pool: &PgPool) -> Result<(), DataError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            patch TEXT NOT NULL,
            revert_patch TEXT,
            applied_at TIMESTAMPTZ
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn fetch_record(pool: &PgPool, name: &str) -> Result<Option<MigrationRecord>, DataError> {
    let row: Option<(String, String, Option<String>, Option<DateTime<Utc>>)> = sqlx::query_as(
        "SELECT name, patch, revert_patch, applied_at FROM _migrations WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(name, patch, revert_patch, applied_at)| MigrationRecord {
        name,
        patch,
        revert_patch,
        applied_at,
    }))
}

/// Scan `dir` and apply every unapplied migration in lexicographic
/// order. Rows whose on-disk `patch`/`revert_patch` changed while still
/// unapplied are updated in place; applied rows are never mutated.
/// Running twice over an unchanged directory leaves the applied set
/// unchanged (idempotent), and a failure aborts before later migrations
/// run.
pub async fn run_migrations(pool: &PgPool, dir: &Path) -> Result<(), DataError> {
    ensure_migrations_table(pool).await?;
    let files = scan_migrations(dir)?;

    for file in files {
        let existing = fetch_record(pool, &file.name).await?;

        match &existing {
            None => {
                sqlx::query(
                    "INSERT INTO _migrations (name, patch, revert_patch, applied_at) VALUES ($1, $2, $3, NULL)",
                )
                .bind(&file.name)
                .bind(&file.patch)
                .bind(&file.revert_patch)
                .execute(pool)
                .await?;
            }
            Some(record) if record.applied_at.is_none() => {
                if record.patch != file.patch || record.revert_patch != file.revert_patch {
                    sqlx::query("UPDATE _migrations SET patch = $2, revert_patch = $3 WHERE name = $1")
                        .bind(&file.name)
                        .bind(&file.patch)
                        .bind(&file.revert_patch)
                        .execute(pool)
                        .await?;
                }
            }
            Some(_) => {
                // Already applied: on-disk changes are ignored.
            }
        }

        let applied = existing.as_ref().map(|r| r.applied_at.is_some()).unwrap_or(false);
        if applied {
            continue;
        }

        info!(migration = %file.name, "applying migration");
        let mut tx = pool.begin().await?;
        if let Err(err) = apply_patch(&mut tx, &file.patch).await {
            error!(migration = %file.name, error = %err, "migration failed");
            return Err(DataError::Migration(file.name.clone(), err.to_string()));
        }
        mark_applied(&mut tx, &file.name).await?;
        tx.commit().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn pairs_up_and_down_files_by_base_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("001_init_up.sql"), "CREATE TABLE t (id INT);").unwrap();
        fs::write(dir.path().join("001_init_down.sql"), "DROP TABLE t;").unwrap();
        fs::write(dir.path().join("002_seed.sql"), "INSERT INTO t VALUES (1);").unwrap();

        let migrations = scan_migrations(dir.path()).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].name, "001_init");
        assert_eq!(migrations[0].patch, "CREATE TABLE t (id INT);");
        assert_eq!(migrations[0].revert_patch.as_deref(), Some("DROP TABLE t;"));
        assert_eq!(migrations[1].name, "002_seed");
        assert_eq!(migrations[1].revert_patch, None);
    }

    #[test]
    fn scan_is_sorted_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_up.sql"), "-- b").unwrap();
        fs::write(dir.path().join("a_up.sql"), "-- a").unwrap();

        let migrations = scan_migrations(dir.path()).unwrap();
        assert_eq!(migrations[0].name, "a");
        assert_eq!(migrations[1].name, "b");
    }

    #[test]
    fn non_sql_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "not sql").unwrap();
        fs::write(dir.path().join("001_up.sql"), "SELECT 1;").unwrap();

        let migrations = scan_migrations(dir.path()).unwrap();
        assert_eq!(migrations.len(), 1);
    }
}

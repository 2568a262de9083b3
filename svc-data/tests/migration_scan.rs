use std::fs;

use svc_data::scan_migrations;

#[test]
fn scanning_the_same_directory_twice_yields_identical_results() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("001_accounts_up.sql"), "CREATE TABLE accounts (id UUID PRIMARY KEY);").unwrap();
    fs::write(dir.path().join("001_accounts_down.sql"), "DROP TABLE accounts;").unwrap();
    fs::write(dir.path().join("002_accounts_index.sql"), "CREATE INDEX ON accounts (id);").unwrap();

    let first = scan_migrations(dir.path()).unwrap();
    let second = scan_migrations(dir.path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn mixed_paired_and_standalone_files_scan_in_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("003_widgets_up.sql"), "CREATE TABLE widgets (id UUID PRIMARY KEY);").unwrap();
    fs::write(dir.path().join("003_widgets_down.sql"), "DROP TABLE widgets;").unwrap();
    fs::write(dir.path().join("001_init.sql"), "CREATE SCHEMA app;").unwrap();
    fs::write(dir.path().join("002_extensions.sql"), "CREATE EXTENSION IF NOT EXISTS pgcrypto;").unwrap();

    let migrations = scan_migrations(dir.path()).unwrap();
    let names: Vec<&str> = migrations.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["001_init", "002_extensions", "003_widgets"]);

    let widgets = migrations.iter().find(|m| m.name == "003_widgets").unwrap();
    assert!(widgets.revert_patch.is_some());

    let init = migrations.iter().find(|m| m.name == "001_init").unwrap();
    assert!(init.revert_patch.is_none());
}

#[test]
fn an_up_file_without_a_matching_down_file_is_still_scanned() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("001_irreversible_up.sql"), "ALTER TABLE t DROP COLUMN legacy;").unwrap();

    let migrations = scan_migrations(dir.path()).unwrap();
    assert_eq!(migrations.len(), 1);
    assert_eq!(migrations[0].name, "001_irreversible");
    assert!(migrations[0].revert_patch.is_none());
}

#[test]
fn an_empty_directory_yields_no_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let migrations = scan_migrations(dir.path()).unwrap();
    assert!(migrations.is_empty());
}

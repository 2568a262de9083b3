use rand::seq::SliceRandom;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DataError;

/// A single registered connection plus a name for health reporting.
#[derive(Clone)]
pub struct Connection {
    pub name: String,
    pub pool: PgPool,
}

impl Connection {
    /// Pings the connection. `svc-core` wraps this in its own
    /// `HealthIndicator` adapter for `/healthz`.
    pub async fn check(&self) -> Result<(), DataError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Logical set of connections for one service: one or more writers, zero
/// or more readers. Tenant scoping is derived per-call from the claims on
/// the caller's context (see [`crate::scope::TenantScope`]); it is never
/// stored on the pool itself.
#[derive(Default)]
pub struct DatastorePool {
    writers: Vec<Connection>,
    readers: Vec<Connection>,
}

impl DatastorePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_writer(&mut self, name: impl Into<String>, dsn: &str) -> Result<(), DataError> {
        let pool = PgPoolOptions::new().connect(dsn).await?;
        self.writers.push(Connection {
            name: name.into(),
            pool,
        });
        Ok(())
    }

    pub async fn register_reader(&mut self, name: impl Into<String>, dsn: &str) -> Result<(), DataError> {
        let pool = PgPoolOptions::new().connect(dsn).await?;
        self.readers.push(Connection {
            name: name.into(),
            pool,
        });
        Ok(())
    }

    /// Chooses a writer when `read_only` is false; otherwise a reader if
    /// any are registered, falling back to a writer, and `None` if
    /// neither exists. Picks uniformly at random among equally eligible
    /// connections.
    pub fn db(&self, read_only: bool) -> Option<&PgPool> {
        let mut rng = rand::thread_rng();
        if !read_only {
            return self.writers.choose(&mut rng).map(|c| &c.pool);
        }
        if let Some(conn) = self.readers.choose(&mut rng) {
            return Some(&conn.pool);
        }
        self.writers.choose(&mut rng).map(|c| &c.pool)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.writers.iter().chain(self.readers.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty() && self.readers.is_empty()
    }
}

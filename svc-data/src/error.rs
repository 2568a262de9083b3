/// Errors raised by the datastore pool and migration runner.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no datastore connection is registered")]
    NoConnection,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration {0:?} failed: {1}")]
    Migration(String, String),

    #[error("failed to read migration directory: {0}")]
    MigrationIo(#[from] std::io::Error),
}

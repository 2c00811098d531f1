use domain::RepositoryError;
use thiserror::Error;

/// Errors that can occur when talking to PostgreSQL.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be turned back into a domain value.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for RepositoryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(
                ref db @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)),
            ) => RepositoryError::Unavailable(db.to_string()),
            other => RepositoryError::backend(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_unavailable() {
        let err: RepositoryError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, RepositoryError::Unavailable(_)));
    }

    #[test]
    fn bad_rows_are_backend_errors() {
        let err: RepositoryError = StoreError::InvalidData("status 'X'".to_string()).into();
        assert!(matches!(err, RepositoryError::Backend(_)));
        assert!(err.to_string().contains("status 'X'"));
    }
}

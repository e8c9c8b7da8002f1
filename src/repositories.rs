pub mod category_repository;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod transaction_repository;
pub mod user_repository;

pub use category_repository::{CategoryRepository, PostgresCategoryRepository};
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryStore;
pub use transaction_repository::{PostgresTransactionRepository, TransactionRepository};
pub use user_repository::{PostgresUserRepository, UserRepository};

/// Repository errors for database operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Resource not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::ConstraintViolation(db_err.message().to_string())
            }
            other => RepositoryError::DatabaseError(other.to_string()),
        }
    }
}

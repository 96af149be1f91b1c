//! Database connection pool and migration management.
//!
//! This module provides utilities for:
//! - Creating and managing a PostgreSQL connection pool
//! - Running the embedded migrations
//! - Registering the bootstrap admin token

use crate::{error::AppError, middleware::auth, tables};
use sqlx::{Pool, Postgres};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the server
/// cannot be reached.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are tracked in `_sqlx_migrations`, so each one runs once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Register `token` as an active admin token.
///
/// Re-running with the same token reactivates it instead of failing on
/// the unique hash.
pub async fn ensure_bootstrap_admin(pool: &DbPool, token: &str) -> Result<(), sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO {} (token_hash, staff_name, role, is_active)
        VALUES ($1, 'bootstrap-admin', 'admin', true)
        ON CONFLICT (token_hash) DO UPDATE SET is_active = true, role = 'admin'
        "#,
        tables::STAFF_TOKENS
    );

    sqlx::query(&sql)
        .bind(auth::hash_token(token))
        .execute(pool)
        .await?;

    Ok(())
}

/// Returns true when a unique constraint rejected the write.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Map a unique-constraint failure to `Conflict(message)`; anything else
/// stays a database error.
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Database(err)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::error::Error as StdError;

    #[derive(Debug, thiserror::Error)]
    #[error("duplicate key value violates unique constraint")]
    pub(crate) struct UniqueViolation;

    impl DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    pub(crate) fn unique_violation() -> sqlx::Error {
        sqlx::Error::Database(Box::new(UniqueViolation))
    }

    #[test]
    fn test_unique_violation_is_detected() {
        assert!(is_unique_violation(&unique_violation()));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let err = conflict_on_unique(unique_violation(), "Already recorded");
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Already recorded"));
    }

    #[test]
    fn test_other_errors_stay_database_errors() {
        let err = conflict_on_unique(sqlx::Error::PoolTimedOut, "Already recorded");
        assert!(matches!(err, AppError::Database(_)));
    }
}

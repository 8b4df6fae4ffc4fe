//! Error types for the fedgate-db crate.
//!
//! Wraps `SQLx` errors with the context of what was being attempted.

use thiserror::Error;

/// Database operation errors.
///
/// # Example
///
/// ```rust
/// use fedgate_db::DbError;
///
/// fn handle_error(err: DbError) {
///     match err {
///         DbError::ConnectionFailed(e) => eprintln!("Cannot connect: {}", e),
///         DbError::MigrationFailed(e) => eprintln!("Migration error: {}", e),
///         DbError::QueryFailed(e) => eprintln!("Query error: {}", e),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    ///
    /// This typically indicates network issues, invalid credentials,
    /// or the database server being unavailable.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),
}

impl DbError {
    /// Returns true when the error means the database could not be reached
    /// at all, as opposed to a statement being rejected.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) => true,
            Self::QueryFailed(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            Self::MigrationFailed(_) => false,
        }
    }
}

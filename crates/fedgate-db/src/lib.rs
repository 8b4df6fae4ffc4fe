//! fedgate database layer
//!
//! Connection pooling and schema migrations for the PostgreSQL-backed
//! logout association store.
//!
//! # Modules
//!
//! - [`pool`] - Thin wrapper around `sqlx::PgPool`
//! - [`migrations`] - Embedded, versioned SQL migrations
//! - [`error`] - Database error type (`DbError`)
//!
//! # Example
//!
//! ```rust,ignore
//! use fedgate_db::{run_migrations, DbPool};
//!
//! let pool = DbPool::connect("postgres://localhost/fedgate").await?;
//! run_migrations(&pool).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;

pub use error::DbError;
pub use migrations::{latest_version, run_migrations};
pub use pool::{DbPool, PoolOptions};

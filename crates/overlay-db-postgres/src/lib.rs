//! PostgreSQL override store for Overlay.
//!
//! Stores override records in the `user_template_override` table, created by
//! the embedded migrations in [`migrations`].
//!
//! # Example
//!
//! ```ignore
//! use overlay_db_postgres::{PostgresConfig, PostgresOverrideStore};
//!
//! let store = PostgresOverrideStore::connect(&PostgresConfig::new("postgres://localhost/overlay")).await?;
//! let records = store.find_overrides_for_user(&"42".into()).await?;
//! ```

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod store;

pub use config::PostgresConfig;
pub use error::{PostgresError, Result};
pub use pool::create_pool;
pub use store::PostgresOverrideStore;

/// PostgreSQL connection pool type alias.
pub type PgPool = sqlx_postgres::PgPool;

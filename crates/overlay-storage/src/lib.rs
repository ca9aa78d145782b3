//! # overlay-storage
//!
//! Storage abstraction layer for Overlay override records.
//!
//! This crate defines the trait every override store implements. It does not
//! contain any implementations - those are provided by `overlay-db-memory` and
//! `overlay-db-postgres`.

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::OverrideStore;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared override store.
pub type DynOverrideStore = std::sync::Arc<dyn OverrideStore>;

//! In-memory override store for Overlay.
//!
//! This crate provides an in-memory implementation of the `OverrideStore`
//! trait from `overlay-storage`, using papaya lock-free HashMap for concurrent
//! access. It backs development servers and tests.
//!
//! # Example
//!
//! ```ignore
//! use overlay_core::OverrideRecord;
//! use overlay_db_memory::InMemoryOverrideStore;
//! use overlay_storage::OverrideStore;
//!
//! let store = InMemoryOverrideStore::new();
//! store.insert(OverrideRecord::new("42", 1, Some("beta"), "/beta"));
//! let records = store.find_overrides_for_user(&"42".into()).await?;
//! ```

pub mod storage;

pub use overlay_storage::{OverrideStore, StorageError};
pub use storage::{InMemoryOverrideStore, RecordId};

/// Creates a shared in-memory override store seeded with `records`.
pub fn create_override_store(
    records: impl IntoIterator<Item = overlay_core::OverrideRecord>,
) -> overlay_storage::DynOverrideStore {
    std::sync::Arc::new(InMemoryOverrideStore::with_records(records))
}

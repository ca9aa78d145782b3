//! Storage traits for the override store abstraction.

use async_trait::async_trait;
use overlay_core::{OverrideRecord, UserId};

use crate::error::StorageError;

/// Read access to persisted override records.
///
/// Implementations must be thread-safe (`Send + Sync`) and must return a
/// user's records in precedence order (see [`overlay_core::precedence_cmp`]):
/// ascending priority with a deterministic tie-break.
///
/// # Example
///
/// ```ignore
/// use overlay_storage::{OverrideStore, StorageError};
///
/// async fn dirs(store: &dyn OverrideStore, user: &UserId) -> Result<Vec<String>, StorageError> {
///     let records = store.find_overrides_for_user(user).await?;
///     Ok(records.into_iter().map(|r| r.override_dir).collect())
/// }
/// ```
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// Returns every override owned by `user_id`, in precedence order.
    ///
    /// An empty vector means the user has no overrides.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn find_overrides_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<OverrideRecord>, StorageError>;

    /// Returns every stored override, grouped by user and in precedence order
    /// within each user.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn list_overrides(&self) -> Result<Vec<OverrideRecord>, StorageError>;

    /// Short backend name for logging.
    fn backend_name(&self) -> &'static str;
}

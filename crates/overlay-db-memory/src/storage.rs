use async_trait::async_trait;
use overlay_core::{OverrideRecord, UserId, sort_by_precedence};
use overlay_storage::{OverrideStore, StorageError};
use papaya::HashMap as PapayaHashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier assigned to each record on insert.
pub type RecordId = u64;

/// In-memory override store using papaya lock-free HashMap.
///
/// Records are keyed by an insertion id so a user may own any number of
/// overrides, including several with the same priority.
#[derive(Debug)]
pub struct InMemoryOverrideStore {
    data: PapayaHashMap<RecordId, OverrideRecord>,
    next_id: AtomicU64,
    queries: AtomicU64,
}

impl InMemoryOverrideStore {
    pub fn new() -> Self {
        Self {
            data: PapayaHashMap::new(),
            next_id: AtomicU64::new(1),
            queries: AtomicU64::new(0),
        }
    }

    /// Creates a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = OverrideRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&self, record: OverrideRecord) -> RecordId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = self.data.pin();
        guard.insert(id, record);
        id
    }

    pub fn remove(&self, id: RecordId) -> Option<OverrideRecord> {
        let guard = self.data.pin();
        guard.remove(&id).cloned()
    }

    /// Removes every record owned by `user_id`, returning how many were removed.
    pub fn remove_user(&self, user_id: &UserId) -> usize {
        let guard = self.data.pin();
        let ids: Vec<RecordId> = guard
            .iter()
            .filter(|(_, record)| &record.user_id == user_id)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            guard.remove(id);
        }
        ids.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of store queries served so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryOverrideStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OverrideStore for InMemoryOverrideStore {
    async fn find_overrides_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<OverrideRecord>, StorageError> {
        self.queries.fetch_add(1, Ordering::Relaxed);

        let guard = self.data.pin();
        let mut records: Vec<OverrideRecord> = guard
            .iter()
            .filter(|(_, record)| &record.user_id == user_id)
            .map(|(_, record)| record.clone())
            .collect();
        sort_by_precedence(&mut records);
        Ok(records)
    }

    async fn list_overrides(&self) -> Result<Vec<OverrideRecord>, StorageError> {
        self.queries.fetch_add(1, Ordering::Relaxed);

        let guard = self.data.pin();
        let mut records: Vec<OverrideRecord> =
            guard.iter().map(|(_, record)| record.clone()).collect();
        records.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| overlay_core::precedence_cmp(a, b))
        });
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "in-memory-papaya"
    }
}

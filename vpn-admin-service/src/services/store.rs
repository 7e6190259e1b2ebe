//! In-memory roster of identity records.
//!
//! Readers take a copy under the read lock and classify outside it, so a
//! reader holds the lock only for the duration of the copy. Writers replace
//! whole records under the write lock; a reader never sees a torn record.

use crate::models::{Identity, IdentityRecord};
use crate::services::lifecycle::build_identity;
use crate::services::IdentityError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct IdentityStore {
    records: RwLock<BTreeMap<String, IdentityRecord>>,
    revision: AtomicU64,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = IdentityRecord>) -> Self {
        Self {
            records: RwLock::new(
                records
                    .into_iter()
                    .map(|r| (r.name.clone(), r))
                    .collect(),
            ),
            revision: AtomicU64::new(0),
        }
    }

    /// Consistent copy of every raw record, ordered by name.
    pub async fn snapshot(&self) -> Vec<IdentityRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Classified roster at `now`, ordered by name.
    pub async fn list(&self, now: DateTime<Utc>) -> Vec<Identity> {
        self.snapshot()
            .await
            .iter()
            .map(|record| build_identity(record, now))
            .collect()
    }

    pub async fn find(&self, name: &str, now: DateTime<Utc>) -> Result<Identity, IdentityError> {
        self.record(name)
            .await
            .map(|record| build_identity(&record, now))
            .ok_or_else(|| IdentityError::NotFound(name.to_string()))
    }

    pub async fn record(&self, name: &str) -> Option<IdentityRecord> {
        self.records.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.records.read().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn upsert(&self, record: IdentityRecord) {
        let mut records = self.records.write().await;
        records.insert(record.name.clone(), record);
        self.bump();
    }

    pub async fn remove(&self, name: &str) -> Result<IdentityRecord, IdentityError> {
        let mut records = self.records.write().await;
        let removed = records
            .remove(name)
            .ok_or_else(|| IdentityError::NotFound(name.to_string()))?;
        self.bump();
        Ok(removed)
    }

    /// Swap the whole roster in one step, as after a backing-store reload,
    /// but only if no mutation landed since `expected` was
    /// read from [`revision`](Self::revision). Returns false and leaves the
    /// roster untouched otherwise.
    pub async fn replace_all_if(
        &self,
        expected: u64,
        new_records: impl IntoIterator<Item = IdentityRecord>,
    ) -> bool {
        let fresh: BTreeMap<String, IdentityRecord> = new_records
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        let mut records = self.records.write().await;
        if self.revision() != expected {
            return false;
        }
        *records = fresh;
        self.bump();
        true
    }

    /// Incremented by every successful mutation. Anything derived from the
    /// roster is stale once this moves.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

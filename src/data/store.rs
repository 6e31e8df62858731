//! Persistence collaborator contract and the in-process implementation.

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::data::models::{CandidateRecord, MissingPerson};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("record {id} rejected: {reason}")]
    Rejected { id: String, reason: String },
    #[error("stored record {id} is malformed: {reason}")]
    Malformed { id: String, reason: String },
}

/// Result of a single existence-checked write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Keyed record storage with upsert-if-absent semantics.
///
/// Writes are idempotent by record id: a second insert of the same id reports
/// [`InsertOutcome::Duplicate`] and leaves the stored record untouched.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist the candidate unless a record with its id already exists.
    async fn insert_if_absent(
        &self,
        candidate: &CandidateRecord,
    ) -> Result<InsertOutcome, StoreError>;

    /// Up to `limit` records, newest `updated_at` first.
    async fn recent(&self, limit: usize) -> Result<Vec<MissingPerson>, StoreError>;
}

/// Process-local store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<IndexMap<String, MissingPerson>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_if_absent(
        &self,
        candidate: &CandidateRecord,
    ) -> Result<InsertOutcome, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&candidate.source_id) {
            return Ok(InsertOutcome::Duplicate);
        }
        let record = candidate.clone().into_record(Utc::now());
        records.insert(record.id.clone(), record);
        Ok(InsertOutcome::Inserted)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MissingPerson>, StoreError> {
        let records = self.records.read().await;
        // Walk newest insert first so the stable sort breaks timestamp ties the same way.
        let mut newest: Vec<MissingPerson> = records.values().rev().cloned().collect();
        newest.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        newest.truncate(limit);
        Ok(newest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::{Category, Gender, Location, NO_FEATURES};

    fn candidate(id: &str, name: &str) -> CandidateRecord {
        CandidateRecord {
            fingerprint: format!("{name}_9_female"),
            source_id: id.to_string(),
            name: name.to_string(),
            age: 9,
            gender: Gender::Female,
            category: Category::MissingChild,
            missing_date: "2026-10-01".into(),
            address: "서울 종로구".into(),
            location: Location {
                lat: 37.5735,
                lng: 126.9790,
                address: "서울 종로구".into(),
            },
            photo_url: None,
            description: NO_FEATURES.into(),
            clothing: NO_FEATURES.into(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_duplicate() {
        let store = MemoryStore::new();
        let first = store.insert_if_absent(&candidate("1", "김하나")).await.unwrap();
        let second = store.insert_if_absent(&candidate("1", "김하나")).await.unwrap();
        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::Duplicate);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_does_not_overwrite() {
        let store = MemoryStore::new();
        store.insert_if_absent(&candidate("1", "김하나")).await.unwrap();
        store.insert_if_absent(&candidate("1", "박두리")).await.unwrap();
        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent[0].name, "김하나");
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        for (id, name) in [("1", "가나"), ("2", "다라"), ("3", "마바")] {
            store.insert_if_absent(&candidate(id, name)).await.unwrap();
        }
        let recent = store.recent(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[tokio::test]
    async fn test_recent_on_empty_store() {
        let store = MemoryStore::new();
        assert!(store.recent(5).await.unwrap().is_empty());
    }
}

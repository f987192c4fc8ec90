//! In-memory `Backend`.
//!
//! Serves the local-only path (no key, no remote) and tests. Rows keep their
//! insertion order per collection. Failures can be injected per record id or
//! per collection to simulate transient network errors.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::autofill::generate_id;
use crate::backend::{
    Backend, BackendError, Collection, FieldPatch, NewRecord, RawRecord,
};

/// A write accepted by the backend, in call order.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteLogEntry {
    pub collection: Collection,
    pub id: String,
    pub owner_id: String,
    pub patch: FieldPatch,
}

#[derive(Default)]
struct Faults {
    /// Record ids whose updates fail.
    updates: HashSet<String>,
    /// Collections whose selects fail.
    selects: HashSet<Collection>,
}

/// In-memory backend with owner scoping on every call.
///
/// Interior mutability via `parking_lot::Mutex`; locks are never held across
/// an await point.
#[derive(Default)]
pub struct MemoryBackend {
    rows: Mutex<HashMap<Collection, Vec<RawRecord>>>,
    writes: Mutex<Vec<WriteLogEntry>>,
    faults: Mutex<Faults>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row exactly as given, bypassing the codec.
    pub fn seed(&self, collection: Collection, record: RawRecord) {
        self.rows.lock().entry(collection).or_default().push(record);
    }

    /// All rows of a collection regardless of owner.
    pub fn rows(&self, collection: Collection) -> Vec<RawRecord> {
        self.rows
            .lock()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Row by id regardless of owner.
    pub fn row(&self, collection: Collection, id: &str) -> Option<RawRecord> {
        self.rows
            .lock()
            .get(&collection)
            .and_then(|rows| rows.iter().find(|r| r.id == id).cloned())
    }

    /// Successful updates, in call order.
    pub fn writes(&self) -> Vec<WriteLogEntry> {
        self.writes.lock().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// Make every update of `id` fail with a transient error.
    pub fn fail_updates_for(&self, id: impl Into<String>) {
        self.faults.lock().updates.insert(id.into());
    }

    /// Make selects on `collection` fail with a transient error.
    pub fn fail_selects_for(&self, collection: Collection) {
        self.faults.lock().selects.insert(collection);
    }

    pub fn clear_faults(&self) {
        let mut faults = self.faults.lock();
        faults.updates.clear();
        faults.selects.clear();
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select_by_owner(
        &self,
        collection: Collection,
        owner_id: &str,
    ) -> Result<Vec<RawRecord>, BackendError> {
        if self.faults.lock().selects.contains(&collection) {
            return Err(BackendError::new(format!(
                "simulated network error selecting {}",
                collection
            )));
        }
        Ok(self
            .rows
            .lock()
            .get(&collection)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.owner_id == owner_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        collection: Collection,
        owner_id: &str,
        record: &NewRecord,
    ) -> Result<RawRecord, BackendError> {
        let row = RawRecord {
            id: generate_id(),
            owner_id: owner_id.to_string(),
            fields: record.fields.clone(),
            completed: record.completed,
            created_at: Utc::now(),
        };
        self.rows
            .lock()
            .entry(collection)
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        owner_id: &str,
        patch: &FieldPatch,
    ) -> Result<(), BackendError> {
        if self.faults.lock().updates.contains(id) {
            return Err(BackendError::new(format!(
                "simulated network error updating {}/{}",
                collection, id
            )));
        }

        {
            let mut rows = self.rows.lock();
            let row = rows
                .get_mut(&collection)
                .and_then(|rows| {
                    rows.iter_mut()
                        .find(|r| r.id == id && r.owner_id == owner_id)
                })
                .ok_or_else(|| BackendError::not_found(collection, id))?;
            for (name, value) in &patch.fields {
                row.fields.insert(name.clone(), value.clone());
            }
            if let Some(completed) = patch.completed {
                row.completed = Some(completed);
            }
        }

        self.writes.lock().push(WriteLogEntry {
            collection,
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }

    async fn delete(
        &self,
        collection: Collection,
        id: &str,
        owner_id: &str,
    ) -> Result<(), BackendError> {
        let mut rows = self.rows.lock();
        let rows = rows
            .get_mut(&collection)
            .ok_or_else(|| BackendError::not_found(collection, id))?;
        let before = rows.len();
        rows.retain(|r| !(r.id == id && r.owner_id == owner_id));
        if rows.len() == before {
            return Err(BackendError::not_found(collection, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendErrorKind, FieldMap};

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    fn new_record(title: &str) -> NewRecord {
        NewRecord {
            fields: fields(&[("title", title)]),
            completed: None,
        }
    }

    #[tokio::test]
    async fn insert_then_select_by_owner() {
        let backend = MemoryBackend::new();
        backend
            .insert(Collection::Ideas, "alice", &new_record("a"))
            .await
            .unwrap();
        backend
            .insert(Collection::Ideas, "bob", &new_record("b"))
            .await
            .unwrap();

        let alice = backend
            .select_by_owner(Collection::Ideas, "alice")
            .await
            .unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].field("title"), Some("a"));
        assert!(backend
            .select_by_owner(Collection::Tasks, "alice")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn update_requires_matching_owner() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert(Collection::Ideas, "alice", &new_record("a"))
            .await
            .unwrap();

        let patch = FieldPatch {
            fields: fields(&[("title", "hijacked")]),
            completed: None,
        };
        let err = backend
            .update(Collection::Ideas, &row.id, "bob", &patch)
            .await
            .unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::NotFound);
        assert_eq!(
            backend.row(Collection::Ideas, &row.id).unwrap().field("title"),
            Some("a")
        );
        assert!(backend.writes().is_empty());
    }

    #[tokio::test]
    async fn update_merges_only_patched_fields() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert(
                Collection::Tasks,
                "alice",
                &NewRecord {
                    fields: fields(&[("title", "t"), ("description", "d")]),
                    completed: Some(false),
                },
            )
            .await
            .unwrap();

        let patch = FieldPatch {
            fields: fields(&[("title", "t2")]),
            completed: Some(true),
        };
        backend
            .update(Collection::Tasks, &row.id, "alice", &patch)
            .await
            .unwrap();

        let stored = backend.row(Collection::Tasks, &row.id).unwrap();
        assert_eq!(stored.field("title"), Some("t2"));
        assert_eq!(stored.field("description"), Some("d"));
        assert_eq!(stored.completed, Some(true));
        assert_eq!(backend.writes().len(), 1);
    }

    #[tokio::test]
    async fn injected_faults() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert(Collection::Ideas, "alice", &new_record("a"))
            .await
            .unwrap();
        backend.fail_updates_for(row.id.clone());
        backend.fail_selects_for(Collection::Thoughts);

        assert!(backend
            .update(Collection::Ideas, &row.id, "alice", &FieldPatch::default())
            .await
            .is_err());
        assert!(backend
            .select_by_owner(Collection::Thoughts, "alice")
            .await
            .is_err());

        backend.clear_faults();
        assert!(backend
            .select_by_owner(Collection::Thoughts, "alice")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn delete_scoped_by_owner() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert(Collection::Ideas, "alice", &new_record("a"))
            .await
            .unwrap();
        assert!(backend
            .delete(Collection::Ideas, &row.id, "bob")
            .await
            .is_err());
        backend
            .delete(Collection::Ideas, &row.id, "alice")
            .await
            .unwrap();
        assert!(backend.rows(Collection::Ideas).is_empty());
    }
}

//! Per-record async locks with write counters.
//!
//! Operations on the same record are sequenced by its lock. Each record also
//! counts the writes made under its lock: a caller that read a record before
//! taking the lock compares the counter against a snapshot taken before the
//! read, and skips its write if someone else wrote in between.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::backend::Collection;

type RecordKey = (Collection, String);

#[derive(Default)]
struct RecordSlot {
    lock: Arc<AsyncMutex<()>>,
    writes: AtomicU64,
}

/// Registry of record locks, shared by the store and the migration sweep.
#[derive(Default)]
pub struct RecordLocks {
    slots: Mutex<HashMap<RecordKey, Arc<RecordSlot>>>,
}

/// Held while a record is being read-modified-written.
pub struct RecordGuard {
    slot: Arc<RecordSlot>,
    _guard: OwnedMutexGuard<()>,
}

impl RecordGuard {
    /// Writes recorded for this record so far.
    pub fn writes(&self) -> u64 {
        self.slot.writes.load(Ordering::Acquire)
    }

    /// Record a successful write. Call after the backend accepted it.
    pub fn record_write(&self) {
        self.slot.writes.fetch_add(1, Ordering::AcqRel);
    }
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, collection: Collection, id: &str) -> Arc<RecordSlot> {
        Arc::clone(
            self.slots
                .lock()
                .entry((collection, id.to_string()))
                .or_default(),
        )
    }

    /// Wait for exclusive access to a record.
    pub async fn lock(&self, collection: Collection, id: &str) -> RecordGuard {
        let slot = self.slot(collection, id);
        let guard = Arc::clone(&slot.lock).lock_owned().await;
        RecordGuard {
            slot,
            _guard: guard,
        }
    }

    /// Write counters of every known record in `collection`.
    ///
    /// Take this before reading the records it will be compared against.
    pub fn snapshot(&self, collection: Collection) -> HashMap<String, u64> {
        self.slots
            .lock()
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|((_, id), slot)| (id.clone(), slot.writes.load(Ordering::Acquire)))
            .collect()
    }

    /// Drop bookkeeping for a deleted record.
    pub fn forget(&self, collection: Collection, id: &str) {
        self.slots.lock().remove(&(collection, id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn writes_are_counted() {
        let locks = RecordLocks::new();
        {
            let guard = locks.lock(Collection::Ideas, "a").await;
            assert_eq!(guard.writes(), 0);
            guard.record_write();
        }
        let snapshot = locks.snapshot(Collection::Ideas);
        assert_eq!(snapshot.get("a"), Some(&1));
        assert!(locks.snapshot(Collection::Tasks).is_empty());
    }

    #[tokio::test]
    async fn same_record_is_sequenced() {
        let locks = Arc::new(RecordLocks::new());
        let guard = locks.lock(Collection::Ideas, "a").await;

        let locks2 = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let guard = locks2.lock(Collection::Ideas, "a").await;
            guard.writes()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        guard.record_write();
        drop(guard);

        assert_eq!(waiter.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn different_records_do_not_block() {
        let locks = RecordLocks::new();
        let _a = locks.lock(Collection::Ideas, "a").await;
        let _b = locks.lock(Collection::Ideas, "b").await;
        let _c = locks.lock(Collection::Tasks, "a").await;
    }

    #[tokio::test]
    async fn forget_resets_counter() {
        let locks = RecordLocks::new();
        locks.lock(Collection::Ideas, "a").await.record_write();
        locks.forget(Collection::Ideas, "a");
        assert!(locks.snapshot(Collection::Ideas).is_empty());
    }
}

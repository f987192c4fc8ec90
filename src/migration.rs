//! Migration sweep: encrypts legacy plaintext text fields in place.
//!
//! Per collection: snapshot record write counters → select the user's rows →
//! for each row, encrypt the text fields that are not yet enveloped → write
//! back only the changed fields, scoped by record id and session user id.
//!
//! A failed fetch skips that collection only. A failed write skips that
//! record only. Nothing is retried; the next login's sweep picks up whatever
//! is still plaintext. Running the sweep again is a no-op. Once the session
//! ends or is replaced, nothing more is written.

use futures::stream::{self, StreamExt};
use jotter_crypto::{encrypt, needs_encryption};
use tracing::{debug, info, warn};

use crate::backend::{Backend, Collection, FieldMap, FieldPatch, RawRecord};
use crate::locks::RecordLocks;
use crate::options::MigrationOptions;
use crate::session::Session;

// ============================================================================
// Report types
// ============================================================================

/// What the sweep did with one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Plaintext fields were encrypted and written back.
    Migrated { fields: Vec<String> },
    /// Every text field was already enveloped or empty; nothing written.
    AlreadyProtected,
    /// The record was written by someone else after it was fetched; left
    /// for the next sweep.
    Stale,
    /// The backend returned a row owned by another user; never written.
    ForeignOwner,
    /// The session ended or was replaced before the write; never written.
    SessionEnded,
    /// Encryption or write-back failed.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    pub id: String,
    pub outcome: RecordOutcome,
}

/// Result of sweeping one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: Collection,
    /// Set when the collection could not be fetched; `records` is then empty.
    pub fetch_error: Option<String>,
    pub records: Vec<RecordReport>,
}

/// Counts over one or more collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Records fetched.
    pub scanned: usize,
    /// Records that needed a write.
    pub attempted: usize,
    pub migrated: usize,
    pub already_protected: usize,
    pub failed: usize,
    /// Stale, foreign-owner, or session-ended records.
    pub skipped: usize,
}

impl CollectionReport {
    fn fetch_failed(collection: Collection, error: String) -> Self {
        Self {
            collection,
            fetch_error: Some(error),
            records: Vec::new(),
        }
    }

    pub fn summary(&self) -> SweepSummary {
        let mut summary = SweepSummary {
            scanned: self.records.len(),
            ..Default::default()
        };
        for record in &self.records {
            match record.outcome {
                RecordOutcome::Migrated { .. } => {
                    summary.attempted += 1;
                    summary.migrated += 1;
                }
                RecordOutcome::Failed { .. } => {
                    summary.attempted += 1;
                    summary.failed += 1;
                }
                RecordOutcome::AlreadyProtected => summary.already_protected += 1,
                RecordOutcome::Stale
                | RecordOutcome::ForeignOwner
                | RecordOutcome::SessionEnded => summary.skipped += 1,
            }
        }
        summary
    }

    /// Outcome for a record id, if the record was scanned.
    pub fn outcome(&self, id: &str) -> Option<&RecordOutcome> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .map(|r| &r.outcome)
    }
}

/// Result of a full sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub user_id: String,
    pub collections: Vec<CollectionReport>,
    /// The session ended mid-sweep; collections after the last one listed
    /// were not visited.
    pub interrupted: bool,
}

impl MigrationReport {
    pub fn collection(&self, collection: Collection) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.collection == collection)
    }

    pub fn summary(&self) -> SweepSummary {
        self.collections
            .iter()
            .map(CollectionReport::summary)
            .fold(SweepSummary::default(), |acc, s| SweepSummary {
                scanned: acc.scanned + s.scanned,
                attempted: acc.attempted + s.attempted,
                migrated: acc.migrated + s.migrated,
                already_protected: acc.already_protected + s.already_protected,
                failed: acc.failed + s.failed,
                skipped: acc.skipped + s.skipped,
            })
    }

    /// Ran to completion with no fetch errors and no record failures.
    pub fn is_clean(&self) -> bool {
        !self.interrupted
            && self.collections.iter().all(|c| c.fetch_error.is_none())
            && self.summary().failed == 0
    }
}

// ============================================================================
// Sweep
// ============================================================================

/// Encrypt every plaintext text field of the session user's records.
///
/// Never fails as a whole: per-collection and per-record problems are
/// recorded in the report. Stops early once `session` is no longer live.
pub async fn migrate<B: Backend + ?Sized>(
    backend: &B,
    session: &Session,
    locks: &RecordLocks,
    options: &MigrationOptions,
) -> MigrationReport {
    let mut collections = Vec::with_capacity(options.collections.len());
    let mut interrupted = false;
    for &collection in &options.collections {
        if !session.is_live() {
            interrupted = true;
            warn!(
                user_id = session.user_id(),
                collection = %collection,
                "session ended; migration sweep stopped"
            );
            break;
        }
        collections.push(migrate_collection(backend, session, locks, collection, options).await);
    }

    let report = MigrationReport {
        user_id: session.user_id().to_string(),
        collections,
        interrupted,
    };
    let summary = report.summary();
    info!(
        user_id = session.user_id(),
        scanned = summary.scanned,
        migrated = summary.migrated,
        failed = summary.failed,
        skipped = summary.skipped,
        "migration sweep finished"
    );
    report
}

/// Sweep a single collection.
pub async fn migrate_collection<B: Backend + ?Sized>(
    backend: &B,
    session: &Session,
    locks: &RecordLocks,
    collection: Collection,
    options: &MigrationOptions,
) -> CollectionReport {
    // Taken before the fetch so any write that lands after it is detected
    let versions = locks.snapshot(collection);

    let rows = match backend.select_by_owner(collection, session.user_id()).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(
                collection = %collection,
                error = %e,
                "migration fetch failed; collection skipped"
            );
            return CollectionReport::fetch_failed(collection, e.to_string());
        }
    };

    let max_in_flight = options.max_in_flight.max(1);
    let records: Vec<RecordReport> = stream::iter(rows)
        .map(|row| {
            let seen = versions.get(&row.id).copied().unwrap_or(0);
            migrate_record(backend, session, locks, collection, row, seen)
        })
        .buffered(max_in_flight)
        .collect()
        .await;

    let report = CollectionReport {
        collection,
        fetch_error: None,
        records,
    };
    let summary = report.summary();
    info!(
        collection = %collection,
        scanned = summary.scanned,
        migrated = summary.migrated,
        already_protected = summary.already_protected,
        failed = summary.failed,
        skipped = summary.skipped,
        "collection migrated"
    );
    report
}

/// Encrypt the plaintext text fields of `row`. Returns only changed fields.
fn plan_patch(
    session: &Session,
    collection: Collection,
    row: &RawRecord,
) -> Result<FieldMap, String> {
    let mut fields = FieldMap::new();
    for name in collection.text_fields() {
        let Some(value) = row.field(name) else {
            continue;
        };
        if !needs_encryption(value) {
            continue;
        }
        let encrypted = encrypt(session.key(), value).map_err(|e| e.to_string())?;
        if encrypted != value {
            fields.insert(name.to_string(), Some(encrypted));
        }
    }
    Ok(fields)
}

async fn migrate_record<B: Backend + ?Sized>(
    backend: &B,
    session: &Session,
    locks: &RecordLocks,
    collection: Collection,
    row: RawRecord,
    seen_writes: u64,
) -> RecordReport {
    let outcome =
        migrate_record_inner(backend, session, locks, collection, &row, seen_writes).await;
    match &outcome {
        RecordOutcome::Failed { reason } => warn!(
            collection = %collection,
            id = %row.id,
            reason = %reason,
            "record migration failed"
        ),
        other => debug!(collection = %collection, id = %row.id, outcome = ?other, "record swept"),
    }
    RecordReport {
        id: row.id,
        outcome,
    }
}

async fn migrate_record_inner<B: Backend + ?Sized>(
    backend: &B,
    session: &Session,
    locks: &RecordLocks,
    collection: Collection,
    row: &RawRecord,
    seen_writes: u64,
) -> RecordOutcome {
    if row.owner_id != session.user_id() {
        return RecordOutcome::ForeignOwner;
    }
    if !session.is_live() {
        return RecordOutcome::SessionEnded;
    }

    let fields = match plan_patch(session, collection, row) {
        Ok(fields) => fields,
        Err(reason) => return RecordOutcome::Failed { reason },
    };
    if fields.is_empty() {
        return RecordOutcome::AlreadyProtected;
    }

    let guard = locks.lock(collection, &row.id).await;
    if guard.writes() != seen_writes {
        return RecordOutcome::Stale;
    }
    // Re-checked under the lock: the session may have ended while waiting
    if !session.is_live() {
        return RecordOutcome::SessionEnded;
    }

    let changed: Vec<String> = fields.keys().cloned().collect();
    let patch = FieldPatch {
        fields,
        completed: None,
    };
    match backend
        .update(collection, &row.id, session.user_id(), &patch)
        .await
    {
        Ok(()) => {
            guard.record_write();
            RecordOutcome::Migrated { fields: changed }
        }
        Err(e) => RecordOutcome::Failed {
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<RecordOutcome>) -> CollectionReport {
        CollectionReport {
            collection: Collection::Ideas,
            fetch_error: None,
            records: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| RecordReport {
                    id: i.to_string(),
                    outcome,
                })
                .collect(),
        }
    }

    #[test]
    fn summary_counts_outcomes() {
        let r = report(vec![
            RecordOutcome::Migrated {
                fields: vec!["title".into()],
            },
            RecordOutcome::AlreadyProtected,
            RecordOutcome::Failed {
                reason: "timeout".into(),
            },
            RecordOutcome::Stale,
            RecordOutcome::ForeignOwner,
            RecordOutcome::SessionEnded,
        ]);
        let s = r.summary();
        assert_eq!(s.scanned, 6);
        assert_eq!(s.attempted, 2);
        assert_eq!(s.migrated, 1);
        assert_eq!(s.failed, 1);
        assert_eq!(s.already_protected, 1);
        assert_eq!(s.skipped, 3);
        assert_eq!(r.outcome("1"), Some(&RecordOutcome::AlreadyProtected));
    }

    #[test]
    fn report_is_clean_only_without_failures() {
        let clean = MigrationReport {
            user_id: "u".into(),
            collections: vec![report(vec![RecordOutcome::AlreadyProtected])],
            interrupted: false,
        };
        assert!(clean.is_clean());

        let interrupted = MigrationReport {
            interrupted: true,
            ..clean.clone()
        };
        assert!(!interrupted.is_clean());

        let fetch_failed = MigrationReport {
            user_id: "u".into(),
            collections: vec![CollectionReport::fetch_failed(
                Collection::Thoughts,
                "offline".into(),
            )],
            interrupted: false,
        };
        assert!(!fetch_failed.is_clean());
        assert!(fetch_failed.collection(Collection::Thoughts).is_some());
        assert!(fetch_failed.collection(Collection::Tasks).is_none());
    }
}

//! CRUD over a `Backend` with every text field passing
//! through the field codec.
//!
//! Reads decrypt, writes encrypt. Every operation runs against the current
//! session and re-checks it before writing, so a key from an ended or
//! replaced login is never used. Writes to one record are sequenced through
//! `RecordLocks`, shared with the migration sweep.

use std::sync::Arc;

use tracing::debug;

use crate::autofill::{normalize_fields, restrict_fields};
use crate::backend::{Backend, Collection, FieldMap, FieldPatch, NewRecord, RawRecord};
use crate::codec::{DecodedRecord, FieldCodec, FieldFailure};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::locks::RecordLocks;
use crate::migration::{migrate, MigrationReport};
use crate::options::{JotterOptions, MigrationOptions};
use crate::session::{Session, SessionManager};

/// A typed record plus any fields that failed to decrypt.
#[derive(Debug)]
pub struct Loaded<E> {
    pub entity: E,
    pub failures: Vec<FieldFailure>,
}

/// Plaintext view of a record being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub fields: FieldMap,
    pub completed: Option<bool>,
}

pub struct RecordStore<B: Backend> {
    backend: B,
    sessions: Arc<SessionManager>,
    locks: RecordLocks,
    migration: MigrationOptions,
}

impl<B: Backend> RecordStore<B> {
    pub fn new(backend: B, sessions: Arc<SessionManager>, options: &JotterOptions) -> Self {
        Self {
            backend,
            sessions,
            locks: RecordLocks::new(),
            migration: options.migration.clone(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn active(&self) -> Result<Arc<Session>> {
        let session = self.sessions.require()?;
        self.sessions.ensure_current(&session)?;
        Ok(session)
    }

    /// All of the user's records in `collection`, decrypted.
    pub async fn list(&self, collection: Collection) -> Result<Vec<DecodedRecord>> {
        let session = self.active()?;
        let rows = self
            .backend
            .select_by_owner(collection, session.user_id())
            .await?;
        self.sessions.ensure_current(&session)?;

        let codec = FieldCodec::new(&session);
        Ok(rows
            .iter()
            .map(|row| codec.decode_record(collection, row))
            .collect())
    }

    /// All of the user's records of type `E`.
    pub async fn list_as<E: Entity>(&self) -> Result<Vec<Loaded<E>>> {
        Ok(self
            .list(E::COLLECTION)
            .await?
            .into_iter()
            .map(|decoded| Loaded {
                entity: E::from_record(decoded.record),
                failures: decoded.failures,
            })
            .collect())
    }

    /// Encrypt and insert a new record. Returns the plaintext view.
    pub async fn create(&self, collection: Collection, draft: NewRecord) -> Result<RawRecord> {
        let session = self.active()?;
        let codec = FieldCodec::new(&session);
        let plaintext = normalize_fields(collection, &draft.fields);
        let stored = NewRecord {
            fields: codec.encode_fields(collection, &plaintext)?,
            completed: draft.completed,
        };

        self.sessions.ensure_current(&session)?;
        let row = self
            .backend
            .insert(collection, session.user_id(), &stored)
            .await?;
        debug!(collection = %collection, id = %row.id, "record created");

        Ok(codec.decode_record(collection, &row).record)
    }

    /// Insert a typed record from its draft.
    pub async fn create_as<E: Entity>(&self, draft: NewRecord) -> Result<E> {
        self.create(E::COLLECTION, draft)
            .await
            .map(E::from_record)
    }

    /// Overwrite the given plaintext fields of a record.
    ///
    /// A value that already parses as an envelope is stored as given. If it
    /// was sealed under another key it reads back as a field failure.
    pub async fn update(&self, collection: Collection, id: &str, patch: FieldPatch) -> Result<()> {
        let session = self.active()?;
        let codec = FieldCodec::new(&session);
        let stored = FieldPatch {
            fields: codec.encode_fields(collection, &restrict_fields(collection, &patch.fields))?,
            completed: patch.completed,
        };
        if stored.is_empty() {
            return Ok(());
        }

        let guard = self.locks.lock(collection, id).await;
        self.sessions.ensure_current(&session)?;
        self.backend
            .update(collection, id, session.user_id(), &stored)
            .await?;
        guard.record_write();
        debug!(collection = %collection, id, "record updated");
        Ok(())
    }

    /// Read-decrypt-edit-encrypt-write under the record lock.
    ///
    /// `edit` sees the current plaintext; only fields it changes are written.
    /// Refuses to edit a record with undecryptable fields.
    pub async fn edit<F>(&self, collection: Collection, id: &str, edit: F) -> Result<RawRecord>
    where
        F: FnOnce(&mut Draft) + Send,
    {
        let session = self.active()?;
        let guard = self.locks.lock(collection, id).await;

        let rows = self
            .backend
            .select_by_owner(collection, session.user_id())
            .await?;
        let row = rows
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound {
                collection,
                id: id.to_string(),
            })?;

        let codec = FieldCodec::new(&session);
        let mut decoded = codec.decode_record(collection, &row);
        if let Some(failure) = decoded.failures.pop() {
            return Err(failure.error.into());
        }

        let before = Draft {
            fields: decoded.record.fields.clone(),
            completed: decoded.record.completed,
        };
        let mut draft = before.clone();
        edit(&mut draft);

        let changed: FieldMap = restrict_fields(collection, &draft.fields)
            .into_iter()
            .filter(|(name, value)| before.fields.get(name) != Some(value))
            .collect();
        let stored = FieldPatch {
            fields: codec.encode_fields(collection, &changed)?,
            completed: draft.completed.filter(|c| before.completed != Some(*c)),
        };

        if !stored.is_empty() {
            self.sessions.ensure_current(&session)?;
            self.backend
                .update(collection, id, session.user_id(), &stored)
                .await?;
            guard.record_write();
            debug!(collection = %collection, id, "record edited");
        }

        let mut record = decoded.record;
        for (name, value) in changed {
            record.fields.insert(name, Some(value.unwrap_or_default()));
        }
        record.completed = draft.completed;
        Ok(record)
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let session = self.active()?;
        let guard = self.locks.lock(collection, id).await;
        self.sessions.ensure_current(&session)?;
        self.backend
            .delete(collection, id, session.user_id())
            .await?;
        drop(guard);
        self.locks.forget(collection, id);
        debug!(collection = %collection, id, "record deleted");
        Ok(())
    }

    /// Run the migration sweep for the current session.
    ///
    /// If the session ends or is replaced mid-sweep, no further records are
    /// written and the report is marked `interrupted`.
    pub async fn sweep(&self) -> Result<MigrationReport> {
        let session = self.active()?;
        Ok(migrate(&self.backend, &session, &self.locks, &self.migration).await)
    }

    /// Run the sweep once per login. Returns `None` if this session already
    /// claimed it.
    pub async fn sweep_once(&self) -> Result<Option<MigrationReport>> {
        let session = self.active()?;
        if !session.claim_sweep() {
            return Ok(None);
        }
        Ok(Some(
            migrate(&self.backend, &session, &self.locks, &self.migration).await,
        ))
    }
}

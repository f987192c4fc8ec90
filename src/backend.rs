//! Backend collaborator contract: the remote store for ideas, thoughts, and
//! tasks, plus the row types that cross it.
//!
//! Every operation is scoped by owner id. Text fields cross this boundary in
//! stored form (envelopes, or legacy plaintext awaiting migration).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Collections
// ============================================================================

/// Entity collections holding user content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Ideas,
    Thoughts,
    Tasks,
}

impl Collection {
    /// All collections, in sweep order.
    pub const ALL: [Collection; 3] = [Collection::Ideas, Collection::Thoughts, Collection::Tasks];

    /// Backend table name.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Ideas => "ideas",
            Collection::Thoughts => "thoughts",
            Collection::Tasks => "tasks",
        }
    }

    /// Free-text fields protected by encryption.
    pub fn text_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Ideas => &["title", "description"],
            Collection::Thoughts => &["content"],
            Collection::Tasks => &["title", "description"],
        }
    }

    pub fn is_text_field(&self, field: &str) -> bool {
        self.text_fields().contains(&field)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Rows
// ============================================================================

/// Text field values by field name. `None` is an absent (null) column.
pub type FieldMap = BTreeMap<String, Option<String>>;

/// A row as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub owner_id: String,
    pub fields: FieldMap,
    /// Task completion flag; `None` for collections without one.
    pub completed: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl RawRecord {
    /// Stored value of a field, if present and non-null.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_deref())
    }
}

/// Payload for inserting a row. The backend assigns id and timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub fields: FieldMap,
    pub completed: Option<bool>,
}

/// Partial update. Only fields present in `fields` are written;
/// `completed` is written when `Some`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    pub fields: FieldMap,
    pub completed: Option<bool>,
}

impl FieldPatch {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.completed.is_none()
    }
}

// ============================================================================
// BackendError
// ============================================================================

/// Category of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Network or availability problem; the operation may succeed later.
    Transient,
    /// No row matched the id and owner.
    NotFound,
    /// The backend refused the request (policy, validation).
    Rejected,
}

/// Error returned by a backend operation. Aborts only that operation.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub message: String,
    pub kind: BackendErrorKind,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: BackendErrorKind::Transient,
        }
    }

    pub fn with_kind(message: impl Into<String>, kind: BackendErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub fn not_found(collection: Collection, id: &str) -> Self {
        Self::with_kind(
            format!("no row {} in {} for this owner", id, collection),
            BackendErrorKind::NotFound,
        )
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}

// ============================================================================
// Backend
// ============================================================================

/// Remote store for entity rows.
///
/// Implementations must apply the owner filter on every call: a row is only
/// visible to, and writable by, the owner id passed in.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All rows of `collection` owned by `owner_id`.
    async fn select_by_owner(
        &self,
        collection: Collection,
        owner_id: &str,
    ) -> Result<Vec<RawRecord>, BackendError>;

    /// Insert a row owned by `owner_id`. Returns the stored row.
    async fn insert(
        &self,
        collection: Collection,
        owner_id: &str,
        record: &NewRecord,
    ) -> Result<RawRecord, BackendError>;

    /// Update the row matching both `id` and `owner_id`.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        owner_id: &str,
        patch: &FieldPatch,
    ) -> Result<(), BackendError>;

    /// Delete the row matching both `id` and `owner_id`.
    async fn delete(
        &self,
        collection: Collection,
        id: &str,
        owner_id: &str,
    ) -> Result<(), BackendError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn select_by_owner(
        &self,
        collection: Collection,
        owner_id: &str,
    ) -> Result<Vec<RawRecord>, BackendError> {
        (**self).select_by_owner(collection, owner_id).await
    }

    async fn insert(
        &self,
        collection: Collection,
        owner_id: &str,
        record: &NewRecord,
    ) -> Result<RawRecord, BackendError> {
        (**self).insert(collection, owner_id, record).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        owner_id: &str,
        patch: &FieldPatch,
    ) -> Result<(), BackendError> {
        (**self).update(collection, id, owner_id, patch).await
    }

    async fn delete(
        &self,
        collection: Collection,
        id: &str,
        owner_id: &str,
    ) -> Result<(), BackendError> {
        (**self).delete(collection, id, owner_id).await
    }
}

//! Typed views of decoded records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{Collection, FieldMap, NewRecord, RawRecord};

/// A record type stored in one collection.
pub trait Entity: Sized + Send {
    const COLLECTION: Collection;

    /// Build from a decoded (plaintext) record.
    fn from_record(record: RawRecord) -> Self;
}

fn text(record: &RawRecord, name: &str) -> String {
    record.field(name).unwrap_or_default().to_string()
}

fn draft_fields(pairs: &[(&str, Option<String>)]) -> FieldMap {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Idea {
    pub fn draft(title: impl Into<String>, description: Option<String>) -> NewRecord {
        NewRecord {
            fields: draft_fields(&[("title", Some(title.into())), ("description", description)]),
            completed: None,
        }
    }
}

impl Entity for Idea {
    const COLLECTION: Collection = Collection::Ideas;

    fn from_record(record: RawRecord) -> Self {
        Self {
            title: text(&record, "title"),
            description: text(&record, "description"),
            id: record.id,
            owner_id: record.owner_id,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Thought {
    pub fn draft(content: impl Into<String>) -> NewRecord {
        NewRecord {
            fields: draft_fields(&[("content", Some(content.into()))]),
            completed: None,
        }
    }
}

impl Entity for Thought {
    const COLLECTION: Collection = Collection::Thoughts;

    fn from_record(record: RawRecord) -> Self {
        Self {
            content: text(&record, "content"),
            id: record.id,
            owner_id: record.owner_id,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn draft(title: impl Into<String>, description: Option<String>) -> NewRecord {
        NewRecord {
            fields: draft_fields(&[("title", Some(title.into())), ("description", description)]),
            completed: Some(false),
        }
    }
}

impl Entity for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn from_record(record: RawRecord) -> Self {
        Self {
            title: text(&record, "title"),
            description: text(&record, "description"),
            completed: record.completed.unwrap_or(false),
            id: record.id,
            owner_id: record.owner_id,
            created_at: record.created_at,
        }
    }
}

//! Client-side encryption core for notes, tasks, and ideas.
//!
//! Text fields are encrypted on the device before they reach the backend and
//! decrypted after they come back. A per-user key is derived at login and
//! lives only in the session. A once-per-login sweep upgrades legacy
//! plaintext rows to encrypted envelopes.

pub mod autofill;
pub mod backend;
pub mod codec;
pub mod entity;
pub mod error;
pub mod locks;
pub mod memory;
pub mod migration;
pub mod options;
pub mod session;
pub mod store;

pub use backend::{
    Backend, BackendError, BackendErrorKind, Collection, FieldMap, FieldPatch, NewRecord,
    RawRecord,
};
pub use codec::{DecodedRecord, FieldCodec, FieldFailure};
pub use entity::{Entity, Idea, Task, Thought};
pub use error::{Error, Result};
pub use locks::RecordLocks;
pub use memory::MemoryBackend;
pub use migration::{
    migrate, migrate_collection, CollectionReport, MigrationReport, RecordOutcome, RecordReport,
    SweepSummary,
};
pub use options::{JotterOptions, MigrationOptions, SessionOptions};
pub use session::{KeyCache, KeySource, MemoryKeyCache, Session, SessionInit, SessionManager};
pub use store::{Draft, Loaded, RecordStore};

pub use jotter_crypto as crypto;

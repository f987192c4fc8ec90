//! Field-level encryption primitives: AES-256-GCM envelopes, PBKDF2 key
//! derivation, and key export/import for session caching.

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod key;
pub mod types;

pub use cipher::{decrypt, encrypt, is_encrypted, needs_encryption, open, Opened};
pub use envelope::{is_envelope, Envelope};
pub use error::CryptoError;
pub use kdf::{derive_key, DeriveKeyInput, KdfParams};
pub use key::{export_key, import_key, SymmetricKey};
pub use types::{
    AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, DEFAULT_PBKDF2_ITERATIONS,
    ENVELOPE_MARKER, MIN_PBKDF2_ITERATIONS,
};

//! AES-256-GCM field encryption.
//!
//! `encrypt` always produces a fresh envelope. `decrypt` passes legacy
//! plaintext (no `enc:` marker) through unchanged, so plaintext and
//! enveloped rows can coexist until the migration sweep has run.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::envelope::{is_envelope, Envelope};
use crate::error::CryptoError;
use crate::key::SymmetricKey;
use crate::types::AES_GCM_IV_LENGTH;

/// Result of opening a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened<'a> {
    /// Value had no envelope marker and was returned as is.
    Plaintext(&'a str),
    /// Value was an envelope and authenticated successfully.
    Decrypted(String),
}

impl Opened<'_> {
    pub fn into_string(self) -> String {
        match self {
            Opened::Plaintext(s) => s.to_string(),
            Opened::Decrypted(s) => s,
        }
    }

    pub fn was_encrypted(&self) -> bool {
        matches!(self, Opened::Decrypted(_))
    }
}

/// Generate a random 12-byte IV for AES-GCM.
pub fn generate_iv() -> Result<[u8; AES_GCM_IV_LENGTH], CryptoError> {
    let mut iv = [0u8; AES_GCM_IV_LENGTH];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(iv)
}

fn cipher_for(key: &SymmetricKey) -> Result<Aes256Gcm, CryptoError> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Whether a stored value already carries the envelope marker.
pub fn is_encrypted(value: &str) -> bool {
    is_envelope(value)
}

/// Whether a stored value should be encrypted by the migration sweep.
///
/// Empty strings and values already enveloped are left alone.
pub fn needs_encryption(value: &str) -> bool {
    !value.is_empty() && !is_envelope(value)
}

/// Encrypt a UTF-8 string into an envelope.
///
/// A new random IV is drawn for every call.
pub fn encrypt(key: &SymmetricKey, plaintext: &str) -> Result<String, CryptoError> {
    let cipher = cipher_for(key)?;
    let iv = generate_iv()?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    Ok(Envelope { iv, ciphertext }.to_string())
}

/// Open a stored value, reporting whether it was encrypted.
pub fn open<'a>(key: &SymmetricKey, value: &'a str) -> Result<Opened<'a>, CryptoError> {
    if !is_envelope(value) {
        return Ok(Opened::Plaintext(value));
    }

    let envelope = Envelope::parse(value)?;
    let cipher = cipher_for(key)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&envelope.iv), envelope.ciphertext.as_slice())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    String::from_utf8(plaintext)
        .map(Opened::Decrypted)
        .map_err(|_| CryptoError::InvalidUtf8)
}

/// Decrypt a stored value. Legacy plaintext is returned unchanged.
///
/// # Errors
/// Malformed envelopes, wrong keys, and tampered ciphertext all fail;
/// they never yield a substitute plaintext.
pub fn decrypt(key: &SymmetricKey, value: &str) -> Result<String, CryptoError> {
    open(key, value).map(Opened::into_string)
}

//! Symmetric key handle and key material transport.
//!
//! Export format: standard base64 (padded) of the 32 raw key bytes.
//! Exports exist only to cache a derived key for the lifetime of a session;
//! they are as sensitive as the key itself.

use std::fmt;

use base64ct::{Base64, Encoding};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::types::AES_KEY_LENGTH;

/// A 256-bit AES-GCM key.
///
/// Zeroized on drop. `Debug` never prints key bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; AES_KEY_LENGTH],
    #[zeroize(skip)]
    extractable: bool,
}

impl SymmetricKey {
    /// Build a key from raw bytes.
    ///
    /// # Arguments
    /// * `bytes` - 32-byte raw key material
    /// * `extractable` - Whether `export_key` may serialize this key
    pub fn from_bytes(bytes: &[u8], extractable: bool) -> Result<Self, CryptoError> {
        let bytes: [u8; AES_KEY_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: AES_KEY_LENGTH,
                got: bytes.len(),
            })?;
        Ok(Self { bytes, extractable })
    }

    /// Generate a random key. Used for ephemeral keys and tests.
    pub fn generate(extractable: bool) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; AES_KEY_LENGTH];
        getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
        let key = Self { bytes, extractable };
        bytes.zeroize();
        Ok(key)
    }

    pub fn is_extractable(&self) -> bool {
        self.extractable
    }

    pub(crate) fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.bytes
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison via XOR accumulation
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[redacted]")
            .field("extractable", &self.extractable)
            .finish()
    }
}

/// Export a key's raw bytes as standard base64.
///
/// Fails with `KeyNotExtractable` unless the key was created extractable.
pub fn export_key(key: &SymmetricKey) -> Result<String, CryptoError> {
    if !key.extractable {
        return Err(CryptoError::KeyNotExtractable);
    }
    Ok(Base64::encode_string(key.as_bytes()))
}

/// Import a key previously produced by `export_key`.
///
/// Only the encoding and length are checked. Bytes from a different key are
/// accepted here and surface later as decryption failures.
pub fn import_key(exported: &str) -> Result<SymmetricKey, CryptoError> {
    let mut raw = Base64::decode_vec(exported.trim())
        .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
    let key = SymmetricKey::from_bytes(&raw, true);
    raw.zeroize();
    key
}

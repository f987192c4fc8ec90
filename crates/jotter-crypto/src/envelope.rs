//! Ciphertext envelope wire format.
//!
//! `enc:<base64(IV, 12 bytes)>:<base64(ciphertext + tag)>`
//!
//! Segments use standard padded base64, which never contains `:`.

use std::fmt;

use base64ct::{Base64, Encoding};

use crate::error::CryptoError;
use crate::types::{AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, ENVELOPE_MARKER, ENVELOPE_SEPARATOR};

/// Parsed envelope: IV plus authenticated ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub iv: [u8; AES_GCM_IV_LENGTH],
    /// Ciphertext with the 16-byte GCM tag appended.
    pub ciphertext: Vec<u8>,
}

/// Whether a stored value carries the envelope marker.
///
/// Says nothing about whether the envelope is well formed.
pub fn is_envelope(value: &str) -> bool {
    value.starts_with(ENVELOPE_MARKER)
}

impl Envelope {
    /// Parse an enveloped string.
    ///
    /// Requires the marker, exactly three `:`-separated segments, valid base64,
    /// a 12-byte IV, and a ciphertext at least as long as the tag.
    pub fn parse(value: &str) -> Result<Self, CryptoError> {
        if !is_envelope(value) {
            return Err(CryptoError::MalformedEnvelope("missing marker".into()));
        }

        let segments: Vec<&str> = value.split(ENVELOPE_SEPARATOR).collect();
        if segments.len() != 3 {
            return Err(CryptoError::MalformedEnvelope(format!(
                "expected 3 segments, got {}",
                segments.len()
            )));
        }

        let iv_bytes = Base64::decode_vec(segments[1])
            .map_err(|e| CryptoError::MalformedEnvelope(format!("IV: {}", e)))?;
        let iv: [u8; AES_GCM_IV_LENGTH] = iv_bytes.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedEnvelope(format!(
                "IV must be {} bytes, got {}",
                AES_GCM_IV_LENGTH,
                iv_bytes.len()
            ))
        })?;

        let ciphertext = Base64::decode_vec(segments[2])
            .map_err(|e| CryptoError::MalformedEnvelope(format!("ciphertext: {}", e)))?;
        if ciphertext.len() < AES_GCM_TAG_LENGTH {
            return Err(CryptoError::MalformedEnvelope(
                "ciphertext shorter than authentication tag".into(),
            ));
        }

        Ok(Self { iv, ciphertext })
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            ENVELOPE_MARKER,
            Base64::encode_string(&self.iv),
            ENVELOPE_SEPARATOR,
            Base64::encode_string(&self.ciphertext)
        )
    }
}

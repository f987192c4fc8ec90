use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Key derivation input missing: {0}")]
    MissingDerivationInput(&'static str),

    #[error("PBKDF2 iterations too low: minimum {minimum}, got {got}")]
    IterationsTooLow { minimum: u32, got: u32 },

    #[error("Key is not extractable")]
    KeyNotExtractable,

    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Decrypted data is not valid UTF-8")]
    InvalidUtf8,

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}

impl CryptoError {
    /// True for failures that mean an enveloped value could not be opened:
    /// wrong key, corrupted or tampered data.
    pub fn is_decryption_error(&self) -> bool {
        matches!(
            self,
            CryptoError::MalformedEnvelope(_)
                | CryptoError::DecryptionFailed(_)
                | CryptoError::InvalidUtf8
        )
    }

    /// True for invalid key derivation inputs.
    pub fn is_derivation_error(&self) -> bool {
        matches!(
            self,
            CryptoError::MissingDerivationInput(_) | CryptoError::IterationsTooLow { .. }
        )
    }
}

/// Marker prefix that tags a stored string as a ciphertext envelope.
///
/// Envelope format: `enc:<base64(IV)>:<base64(ciphertext + tag)>`
/// Any string without this prefix is legacy plaintext.
pub const ENVELOPE_MARKER: &str = "enc:";

/// Separator between envelope segments.
pub const ENVELOPE_SEPARATOR: char = ':';

/// AES-GCM IV length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_IV_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// AES key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// Lowest PBKDF2 iteration count accepted by key derivation.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Default PBKDF2 iteration count.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = MIN_PBKDF2_ITERATIONS;

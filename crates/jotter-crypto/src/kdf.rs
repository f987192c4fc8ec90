//! PBKDF2-HMAC-SHA256 key derivation from session identity data.
//!
//! password = identity || user_id, salted and iterated. Identical inputs
//! always produce the same key, so the key is never stored.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::key::SymmetricKey;
use crate::types::{AES_KEY_LENGTH, DEFAULT_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS};

/// Identity material available after authentication.
#[derive(Debug, Clone)]
pub struct DeriveKeyInput<'a> {
    /// Username or email of the signed-in user.
    pub identity: &'a str,
    /// Backend user id.
    pub user_id: &'a str,
    /// Per-user salt.
    pub salt: &'a [u8],
}

/// Derivation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// PBKDF2 iteration count. Must be at least `MIN_PBKDF2_ITERATIONS`.
    pub iterations: u32,
    /// Whether the derived key may be exported for session caching.
    pub extractable: bool,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
            extractable: false,
        }
    }
}

/// Derive a 256-bit key from identity, user id, and salt.
///
/// # Errors
/// * `MissingDerivationInput` if identity, user id, or salt is empty
/// * `IterationsTooLow` if `params.iterations` is below the minimum
pub fn derive_key(
    input: &DeriveKeyInput<'_>,
    params: &KdfParams,
) -> Result<SymmetricKey, CryptoError> {
    if input.identity.is_empty() {
        return Err(CryptoError::MissingDerivationInput("identity"));
    }
    if input.user_id.is_empty() {
        return Err(CryptoError::MissingDerivationInput("user_id"));
    }
    if input.salt.is_empty() {
        return Err(CryptoError::MissingDerivationInput("salt"));
    }
    if params.iterations < MIN_PBKDF2_ITERATIONS {
        return Err(CryptoError::IterationsTooLow {
            minimum: MIN_PBKDF2_ITERATIONS,
            got: params.iterations,
        });
    }

    let mut password = Vec::with_capacity(input.identity.len() + input.user_id.len());
    password.extend_from_slice(input.identity.as_bytes());
    password.extend_from_slice(input.user_id.as_bytes());

    let mut okm = [0u8; AES_KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(&password, input.salt, params.iterations, &mut okm);
    password.zeroize();

    let key = SymmetricKey::from_bytes(&okm, params.extractable);
    okm.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{decrypt, encrypt};
    use crate::key::export_key;

    fn input<'a>(identity: &'a str, user_id: &'a str, salt: &'a [u8]) -> DeriveKeyInput<'a> {
        DeriveKeyInput {
            identity,
            user_id,
            salt,
        }
    }

    fn extractable() -> KdfParams {
        KdfParams {
            extractable: true,
            ..Default::default()
        }
    }

    #[test]
    fn deterministic() {
        let a = derive_key(&input("alice", "user-1", b"salt"), &extractable()).unwrap();
        let b = derive_key(&input("alice", "user-1", b"salt"), &extractable()).unwrap();
        assert_eq!(a, b);
        assert_eq!(export_key(&a).unwrap(), export_key(&b).unwrap());
    }

    #[test]
    fn identical_inputs_interoperate() {
        let k1 = derive_key(&input("alice", "user-1", b"salt"), &KdfParams::default()).unwrap();
        let k2 = derive_key(&input("alice", "user-1", b"salt"), &KdfParams::default()).unwrap();
        let envelope = encrypt(&k2, "shopping list").unwrap();
        assert_eq!(decrypt(&k1, &envelope).unwrap(), "shopping list");
    }

    #[test]
    fn different_salts_different_keys() {
        let a = derive_key(&input("alice", "user-1", b"salt-a"), &KdfParams::default()).unwrap();
        let b = derive_key(&input("alice", "user-1", b"salt-b"), &KdfParams::default()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_users_different_keys() {
        let a = derive_key(&input("alice", "user-1", b"salt"), &KdfParams::default()).unwrap();
        let b = derive_key(&input("alice", "user-2", b"salt"), &KdfParams::default()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn matches_raw_pbkdf2_over_concatenated_password() {
        let key = derive_key(&input("bob", "42", b"pepper"), &extractable()).unwrap();
        let mut expected = [0u8; 32];
        pbkdf2_hmac::<Sha256>(b"bob42", b"pepper", DEFAULT_PBKDF2_ITERATIONS, &mut expected);
        assert_eq!(key.as_bytes(), &expected);
    }

    #[test]
    fn rejects_empty_inputs() {
        let params = KdfParams::default();
        assert!(matches!(
            derive_key(&input("", "user-1", b"salt"), &params),
            Err(CryptoError::MissingDerivationInput("identity"))
        ));
        assert!(matches!(
            derive_key(&input("alice", "", b"salt"), &params),
            Err(CryptoError::MissingDerivationInput("user_id"))
        ));
        let err = derive_key(&input("alice", "user-1", b""), &params).unwrap_err();
        assert!(err.is_derivation_error());
    }

    #[test]
    fn rejects_low_iterations() {
        let params = KdfParams {
            iterations: 1_000,
            extractable: false,
        };
        let err = derive_key(&input("alice", "user-1", b"salt"), &params).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::IterationsTooLow {
                minimum: 100_000,
                got: 1_000
            }
        ));
    }

    #[test]
    fn default_keys_are_not_extractable() {
        let key = derive_key(&input("alice", "user-1", b"salt"), &KdfParams::default()).unwrap();
        assert!(!key.is_extractable());
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: KdfParams = serde_json::from_str(r#"{"extractable":true}"#).unwrap();
        assert_eq!(params.iterations, DEFAULT_PBKDF2_ITERATIONS);
        assert!(params.extractable);
    }
}

//! Configuration for key derivation, session key caching, and the migration
//! sweep. Every section has defaults, so a partial JSON document is enough.

use jotter_crypto::{KdfParams, MIN_PBKDF2_ITERATIONS};
use serde::{Deserialize, Serialize};

use crate::backend::Collection;
use crate::error::{Error, Result};

/// Default number of records a sweep keeps in flight per collection.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Top-level options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JotterOptions {
    pub kdf: KdfParams,
    pub session: SessionOptions,
    pub migration: MigrationOptions,
}

/// Session key handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Export the derived key into the session key cache so a reload can
    /// restore it without the derivation inputs. Requires `kdf.extractable`.
    pub cache_key: bool,
}

/// Migration sweep behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    /// Records of one collection with encrypt-and-write in flight at once.
    pub max_in_flight: usize,
    /// Collections to sweep, in order.
    pub collections: Vec<Collection>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            collections: Collection::ALL.to_vec(),
        }
    }
}

impl JotterOptions {
    /// Parse and validate options from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: JotterOptions =
            serde_json::from_str(json).map_err(|e| Error::Options(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kdf.iterations < MIN_PBKDF2_ITERATIONS {
            return Err(Error::Options(format!(
                "kdf.iterations must be at least {}, got {}",
                MIN_PBKDF2_ITERATIONS, self.kdf.iterations
            )));
        }
        if self.session.cache_key && !self.kdf.extractable {
            return Err(Error::Options(
                "session.cache_key requires kdf.extractable".into(),
            ));
        }
        if self.migration.max_in_flight == 0 {
            return Err(Error::Options(
                "migration.max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

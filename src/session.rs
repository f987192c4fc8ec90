//! Session lifecycle: the authenticated user id and the key derived for it.
//!
//! A `Session` is created by `SessionManager::begin` after login and passed
//! explicitly to the codec, the store, and the migration sweep. The key is
//! immutable for the life of the session. `end` (or a newer `begin`) retires
//! the session; code holding an `Arc<Session>` from an older login is
//! rejected by `SessionManager::ensure_current`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jotter_crypto::{
    derive_key, export_key, import_key, CryptoError, DeriveKeyInput, KdfParams, SymmetricKey,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::options::{JotterOptions, SessionOptions};

// ============================================================================
// KeyCache
// ============================================================================

/// Session-scoped storage for an exported key (e.g. browser session storage).
///
/// Contents are as sensitive as the key. Entries must not outlive the
/// session; `SessionManager::end` clears them.
pub trait KeyCache: Send + Sync {
    fn load(&self, user_id: &str) -> Option<String>;
    fn store(&self, user_id: &str, exported: &str);
    fn clear(&self, user_id: &str);
}

/// In-process `KeyCache`.
#[derive(Default)]
pub struct MemoryKeyCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.entries.lock().contains_key(user_id)
    }
}

impl KeyCache for MemoryKeyCache {
    fn load(&self, user_id: &str) -> Option<String> {
        self.entries.lock().get(user_id).cloned()
    }

    fn store(&self, user_id: &str, exported: &str) {
        self.entries
            .lock()
            .insert(user_id.to_string(), exported.to_string());
    }

    fn clear(&self, user_id: &str) {
        self.entries.lock().remove(user_id);
    }
}

// ============================================================================
// Session
// ============================================================================

/// Inputs available right after authentication.
///
/// `identity` and `salt` may be missing on a reload; the key is then
/// restored from the key cache if caching is enabled.
#[derive(Debug, Clone, Copy)]
pub struct SessionInit<'a> {
    pub user_id: &'a str,
    pub identity: Option<&'a str>,
    pub salt: Option<&'a [u8]>,
}

impl<'a> SessionInit<'a> {
    pub fn new(user_id: &'a str, identity: &'a str, salt: &'a [u8]) -> Self {
        Self {
            user_id,
            identity: Some(identity),
            salt: Some(salt),
        }
    }

    /// Reload without derivation inputs.
    pub fn restore(user_id: &'a str) -> Self {
        Self {
            user_id,
            identity: None,
            salt: None,
        }
    }
}

/// How the session key was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Derived,
    Cache,
}

/// An authenticated user and their key.
pub struct Session {
    user_id: String,
    key: SymmetricKey,
    generation: u64,
    source: KeySource,
    swept: AtomicBool,
    retired: AtomicBool,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    /// Login counter value this session was issued under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn key_source(&self) -> KeySource {
        self.source
    }

    /// Claim the once-per-login migration sweep. Returns true only for the
    /// first caller.
    pub fn claim_sweep(&self) -> bool {
        !self.swept.swap(true, Ordering::AcqRel)
    }

    pub fn is_swept(&self) -> bool {
        self.swept.load(Ordering::Acquire)
    }

    /// False once the manager ended or replaced this session. A detached
    /// session stays live until dropped.
    pub fn is_live(&self) -> bool {
        !self.retired.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Session around an existing key, outside any manager. The generation
    /// is 0, which no managed session uses.
    pub fn detached(user_id: impl Into<String>, key: SymmetricKey) -> Self {
        Self {
            user_id: user_id.into(),
            key,
            generation: 0,
            source: KeySource::Derived,
            swept: AtomicBool::new(false),
            retired: AtomicBool::new(false),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("generation", &self.generation)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionManager
// ============================================================================

#[derive(Default)]
struct SessionState {
    current: Option<Arc<Session>>,
    generation: u64,
}

/// Owns the current session and its lifecycle.
pub struct SessionManager {
    kdf: KdfParams,
    options: SessionOptions,
    cache: Option<Arc<dyn KeyCache>>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    /// Fails with `Error::Options` if `options` do not validate.
    pub fn new(options: &JotterOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            kdf: options.kdf,
            options: options.session.clone(),
            cache: None,
            state: RwLock::new(SessionState::default()),
        })
    }

    /// Attach a key cache. Used only when `session.cache_key` is enabled.
    pub fn with_key_cache(mut self, cache: Arc<dyn KeyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn cache(&self) -> Option<&Arc<dyn KeyCache>> {
        if self.options.cache_key {
            self.cache.as_ref()
        } else {
            None
        }
    }

    /// Start a session, replacing any current one.
    ///
    /// Derives the key when identity and salt are present, otherwise restores
    /// it from the key cache.
    pub fn begin(&self, init: SessionInit<'_>) -> Result<Arc<Session>> {
        if init.user_id.is_empty() {
            return Err(CryptoError::MissingDerivationInput("user_id").into());
        }

        let (key, source) = match (init.identity, init.salt) {
            (Some(identity), Some(salt)) => {
                let input = DeriveKeyInput {
                    identity,
                    user_id: init.user_id,
                    salt,
                };
                let key = derive_key(&input, &self.kdf)?;
                if let Some(cache) = self.cache() {
                    cache.store(init.user_id, &export_key(&key)?);
                    debug!(user_id = init.user_id, "cached exported session key");
                }
                (key, KeySource::Derived)
            }
            (identity, _) => {
                let cached = self.cache().and_then(|cache| cache.load(init.user_id));
                match cached {
                    Some(exported) => (import_key(&exported)?, KeySource::Cache),
                    None if identity.is_none() => {
                        return Err(CryptoError::MissingDerivationInput("identity").into())
                    }
                    None => return Err(CryptoError::MissingDerivationInput("salt").into()),
                }
            }
        };

        let mut state = self.state.write();
        if let Some(previous) = state.current.take() {
            previous.retire();
            warn!(
                user_id = previous.user_id(),
                generation = previous.generation(),
                "replacing active session without end()"
            );
        }
        state.generation += 1;
        let session = Arc::new(Session {
            user_id: init.user_id.to_string(),
            key,
            generation: state.generation,
            source,
            swept: AtomicBool::new(false),
            retired: AtomicBool::new(false),
        });
        state.current = Some(Arc::clone(&session));
        info!(
            user_id = session.user_id(),
            generation = session.generation(),
            source = ?source,
            "session started"
        );
        Ok(session)
    }

    /// End the current session and drop its cached key.
    pub fn end(&self) {
        let ended = self.state.write().current.take();
        if let Some(session) = ended {
            session.retire();
            if let Some(cache) = self.cache.as_ref() {
                cache.clear(session.user_id());
            }
            info!(
                user_id = session.user_id(),
                generation = session.generation(),
                "session ended"
            );
        }
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.state.read().current.clone()
    }

    /// The current session, or `NoSession`.
    pub fn require(&self) -> Result<Arc<Session>> {
        self.current().ok_or(Error::NoSession)
    }

    /// Check that `session` is still the active one.
    pub fn ensure_current(&self, session: &Session) -> Result<()> {
        let state = self.state.read();
        match &state.current {
            Some(current) if current.generation() == session.generation() => Ok(()),
            Some(_) => Err(Error::StaleSession),
            None if session.generation() == 0 => Err(Error::NoSession),
            None => Err(Error::StaleSession),
        }
    }
}

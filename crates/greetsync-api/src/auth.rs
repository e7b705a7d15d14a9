// Session store
//
// Owns the access/refresh token pair. Every mutation writes through to a
// durable `TokenStorage` backend; reads come from the in-memory copy loaded
// at construction so the hot request path never touches disk or keyring.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, warn};

/// Storage key for the access token.
pub const TOKEN_KEY: &str = "token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

// ── Storage backend ─────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("token storage error: {0}")]
pub struct StorageError(pub String);

/// Durable string key-value storage for the credential pair.
///
/// Implementations live next to the configuration layer (keyring, file);
/// [`MemoryTokenStorage`] is provided for tests and ephemeral sessions.
pub trait TokenStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed storage with a credential pair, as if a previous run had logged in.
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let storage = Self::new();
        {
            let mut entries = storage.entries.lock().expect("token storage lock poisoned");
            entries.insert(TOKEN_KEY.into(), access.into());
            entries.insert(REFRESH_TOKEN_KEY.into(), refresh.into());
        }
        storage
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().expect("token storage lock poisoned");
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().expect("token storage lock poisoned");
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().expect("token storage lock poisoned");
        entries.remove(key);
        Ok(())
    }
}

// ── Token pair ──────────────────────────────────────────────────────

/// Access + refresh token as issued by `/login_check` and `/token/refresh`.
#[derive(Debug, Clone, Default)]
pub struct TokenPair {
    pub access: SecretString,
    pub refresh: SecretString,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: SecretString::from(refresh.into()),
        }
    }

    fn is_complete(&self) -> bool {
        !self.access.expose_secret().is_empty() && !self.refresh.expose_secret().is_empty()
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// The session store.
///
/// Logged in iff both tokens are non-empty. Token contents are never
/// validated here; that is the server's job.
pub struct Session {
    storage: Box<dyn TokenStorage>,
    tokens: RwLock<TokenPair>,
}

impl Session {
    /// Load whatever credentials the backend currently holds.
    pub fn new(storage: impl TokenStorage + 'static) -> Self {
        let read = |key: &str| match storage.read(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, key, "failed to read persisted token");
                String::new()
            }
        };
        let tokens = TokenPair::new(read(TOKEN_KEY), read(REFRESH_TOKEN_KEY));

        Self {
            storage: Box::new(storage),
            tokens: RwLock::new(tokens),
        }
    }

    /// An empty session backed by [`MemoryTokenStorage`].
    pub fn in_memory() -> Self {
        Self::new(MemoryTokenStorage::new())
    }

    /// Current access token, or an empty string when logged out.
    pub fn access_token(&self) -> String {
        let tokens = self.tokens.read().expect("session lock poisoned");
        tokens.access.expose_secret().to_owned()
    }

    /// Current refresh token, or an empty string when logged out.
    pub fn refresh_token(&self) -> String {
        let tokens = self.tokens.read().expect("session lock poisoned");
        tokens.refresh.expose_secret().to_owned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.read().expect("session lock poisoned").is_complete()
    }

    /// Replace both tokens and persist them.
    pub fn set_credentials(&self, access: &str, refresh: &str) {
        {
            let mut tokens = self.tokens.write().expect("session lock poisoned");
            *tokens = TokenPair::new(access, refresh);
        }
        self.persist(TOKEN_KEY, access);
        self.persist(REFRESH_TOKEN_KEY, refresh);
        debug!("session credentials updated");
    }

    /// Drop both tokens from memory and durable storage.
    pub fn clear_credentials(&self) {
        {
            let mut tokens = self.tokens.write().expect("session lock poisoned");
            *tokens = TokenPair::default();
        }
        self.persist(TOKEN_KEY, "");
        self.persist(REFRESH_TOKEN_KEY, "");
        debug!("session credentials cleared");
    }

    fn persist(&self, key: &str, value: &str) {
        let result = if value.is_empty() {
            self.storage.remove(key)
        } else {
            self.storage.write(key, value)
        };
        if let Err(e) = result {
            warn!(error = %e, key, "failed to persist session token");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

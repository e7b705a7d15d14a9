// ── Durable token storage ──
//
// Backends for the session store's two keys (`token`, `refresh_token`).
// Each profile gets its own namespace so switching profiles never mixes
// credentials.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use greetsync_api::{StorageError, TokenStorage};
use tracing::debug;

use crate::ConfigError;

/// Keyring service name for every greetsync secret.
pub const KEYRING_SERVICE: &str = "greetsync";

// ── Keyring ─────────────────────────────────────────────────────────

/// Tokens in the platform keyring, as `{profile}/{key}` entries.
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    profile: String,
}

impl KeyringTokenStorage {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, StorageError> {
        keyring::Entry::new(KEYRING_SERVICE, &format!("{}/{key}", self.profile))
            .map_err(|e| StorageError(e.to_string()))
    }
}

impl TokenStorage for KeyringTokenStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError(e.to_string())),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| StorageError(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError(e.to_string())),
        }
    }
}

// ── File ────────────────────────────────────────────────────────────

/// Tokens in a JSON map on disk, for hosts without a usable keyring.
///
/// The whole map is rewritten on every change.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `{data_dir}/tokens-{profile}.json`
    pub fn for_profile(profile: &str) -> Self {
        Self::new(crate::data_dir().join(format!("tokens-{profile}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                StorageError(format!("corrupt token file {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StorageError(e.to_string())),
        }
    }

    fn store(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(entries).map_err(|e| StorageError(e.to_string()))?;
        write_private(&self.path, raw.as_bytes()).map_err(|e| StorageError(e.to_string()))?;
        debug!(path = %self.path.display(), "token file written");
        Ok(())
    }
}

/// Write `contents` to a sibling temp file readable only by the owner, then
/// rename it over `path` so readers never see a partial file.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    // A leftover temp file would keep its old mode through `create`.
    if let Err(e) = std::fs::remove_file(&tmp) {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(e);
        }
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)
}

impl TokenStorage for FileTokenStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().expect("token file lock poisoned");
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().expect("token file lock poisoned");
        let mut entries = self.load()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.store(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().expect("token file lock poisoned");
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.store(&entries)?;
        }
        Ok(())
    }
}

// ── Selection ───────────────────────────────────────────────────────

/// The backend a profile is configured to use.
#[derive(Debug)]
pub enum ProfileTokenStorage {
    Keyring(KeyringTokenStorage),
    File(FileTokenStorage),
}

impl ProfileTokenStorage {
    /// `kind` is `"keyring"` or `"file"`.
    pub fn open(kind: &str, profile: &str) -> Result<Self, ConfigError> {
        match kind {
            "keyring" => Ok(Self::Keyring(KeyringTokenStorage::new(profile))),
            "file" => Ok(Self::File(FileTokenStorage::for_profile(profile))),
            other => Err(ConfigError::Validation {
                field: "token_store".into(),
                reason: format!("expected 'keyring' or 'file', got '{other}'"),
            }),
        }
    }

    fn backend(&self) -> &dyn TokenStorage {
        match self {
            Self::Keyring(k) => k,
            Self::File(f) => f,
        }
    }
}

impl TokenStorage for ProfileTokenStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend().read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend().write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.backend().remove(key)
    }
}

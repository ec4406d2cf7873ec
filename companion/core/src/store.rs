//! Persistence
//!
//! The conversation record is one JSON blob under a fixed session key; the
//! API key lives in a separate file so the record can be shared or reset
//! without touching the credential.
//!
//! Loading never fails: a missing or corrupt blob yields the initial state.
//! Saving may fail, and the [`Responder`](crate::responder::Responder)
//! decides what that means (it degrades to memory-only).

#[cfg(unix)]
use std::fs::Permissions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::state::ConversationState;

/// Session key of the persisted record
pub const SESSION_KEY: &str = "zoe_state";

/// Credential file name inside the data directory
pub const CREDENTIAL_FILE: &str = "credential";

/// Required credential prefix
pub const CREDENTIAL_PREFIX: &str = "sk-";

// ============================================================================
// Errors
// ============================================================================

/// Errors saving the conversation record
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Record could not be serialized
    #[error("could not serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Storage refused the write
    #[error("storage unavailable")]
    Unavailable,
}

/// Errors handling the API key
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Key does not start with the expected prefix
    #[error("invalid key format, expected {CREDENTIAL_PREFIX}...")]
    InvalidFormat,

    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// State stores
// ============================================================================

/// Where the conversation record lives
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the record, or the initial state if there is none usable
    async fn load(&self) -> ConversationState;

    /// Persist the record
    async fn save(&self, state: &ConversationState) -> Result<(), StoreError>;

    /// Forget the record
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Parse a persisted blob, falling back to the initial state
fn decode(blob: &str, origin: &str) -> ConversationState {
    match serde_json::from_str(blob) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(origin, error = %e, "Corrupt conversation record, starting fresh");
            ConversationState::default()
        }
    }
}

/// JSON file store (`<data_dir>/zoe_state.json`)
///
/// Writes go to a temporary sibling first and are renamed into place.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store inside `data_dir`
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(format!("{SESSION_KEY}.json")),
        }
    }

    /// File holding the record
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> ConversationState {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(blob) => {
                let state = decode(&blob, "file");
                tracing::info!(
                    path = %self.path.display(),
                    phase = %state.phase(),
                    turn_count = state.turn_count(),
                    "Loaded conversation record"
                );
                state
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No conversation record yet");
                ConversationState::default()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read conversation record");
                ConversationState::default()
            }
        }
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        let blob = serde_json::to_string_pretty(state)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::trace!(path = %self.path.display(), "Saved conversation record");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// In-memory store holding the serialized blob
///
/// Goes through JSON like the file store. Can be switched to fail every
/// save to exercise degraded mode.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Mutex<Option<String>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose saves always fail
    #[must_use]
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    /// Store pre-loaded with a raw blob (may be garbage)
    #[must_use]
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
            ..Self::default()
        }
    }

    /// Toggle forced failures
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful saves so far
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current raw blob
    pub async fn blob(&self) -> Option<String> {
        self.blob.lock().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> ConversationState {
        match self.blob.lock().await.as_deref() {
            Some(blob) => decode(blob, "memory"),
            None => ConversationState::default(),
        }
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        let blob = serde_json::to_string(state)?;
        *self.blob.lock().await = Some(blob);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.blob.lock().await = None;
        Ok(())
    }
}

// ============================================================================
// Credential
// ============================================================================

/// Check the key format, returning the trimmed key
///
/// # Errors
///
/// Returns [`CredentialError::InvalidFormat`] unless the key starts with
/// `sk-` and has something after it.
pub fn validate_key(key: &str) -> Result<&str, CredentialError> {
    let key = key.trim();
    if key.len() > CREDENTIAL_PREFIX.len() && key.starts_with(CREDENTIAL_PREFIX) {
        Ok(key)
    } else {
        Err(CredentialError::InvalidFormat)
    }
}

/// API key file (`<data_dir>/credential`, mode 0600 on Unix)
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store inside `data_dir`
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CREDENTIAL_FILE),
        }
    }

    /// File holding the key
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Stored key, if present and well-formed
    pub async fn load(&self) -> Option<String> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Could not read credential");
                }
                return None;
            }
        };

        match validate_key(&raw) {
            Ok(key) => Some(key.to_string()),
            Err(_) => {
                tracing::warn!(path = %self.path.display(), "Ignoring malformed stored credential");
                None
            }
        }
    }

    /// Validate and persist `key`, returning the trimmed key
    ///
    /// # Errors
    ///
    /// [`CredentialError::InvalidFormat`] for a malformed key (nothing is
    /// written), [`CredentialError::Io`] if the file cannot be written.
    pub async fn save(&self, key: &str) -> Result<String, CredentialError> {
        let key = validate_key(key)?.to_string();

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&self.path, key.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        restrict_permissions(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::info!(path = %self.path.display(), "Credential saved");
        Ok(key)
    }

    /// Remove the stored key
    ///
    /// # Errors
    ///
    /// [`CredentialError::Io`] if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), CredentialError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

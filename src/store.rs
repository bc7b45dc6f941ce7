//! Credential store for the EchoCheck session
//!
//! Holds the current token pair in memory and writes it through to a
//! pluggable backend so a session survives a process restart. The pair is
//! set and cleared as a unit; callers never observe a half-updated pair.

use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::types::TokenPair;

/// Errors that can occur during credential storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error during storage operations
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable backend behind the in-memory store
///
/// Implementations are synchronous; calls are short local operations and the
/// store never holds its lock while invoking them.
pub trait TokenBackend: Send + Sync {
    /// Load the persisted pair, if any
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<TokenPair>, StoreError>;

    /// Persist the pair, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the pair cannot be written.
    fn persist(&self, pair: &TokenPair) -> Result<(), StoreError>;

    /// Remove the persisted pair; succeeds when nothing is stored
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be removed.
    fn wipe(&self) -> Result<(), StoreError>;
}

// ============================================================================
// File Backend
// ============================================================================

/// File-backed storage: one JSON document with the two token keys
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FileBackend {
    /// Create a backend at the default path (platform-specific config directory)
    #[must_use]
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("echocheck");

        Self {
            path: config_dir.join("credentials.json"),
        }
    }

    /// Create a backend at a custom path
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the storage path
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenBackend for FileBackend {
    fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let pair: TokenPair = serde_json::from_str(&content)?;

        Ok(Some(pair))
    }

    fn persist(&self, pair: &TokenPair) -> Result<(), StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(pair)?;
        std::fs::write(&self.path, &content)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }

    fn wipe(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

// ============================================================================
// Memory Backend
// ============================================================================

/// In-memory backend that persists nothing beyond its own lifetime
///
/// Useful for tests and for ephemeral sessions that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slot: RwLock<Option<TokenPair>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenBackend for MemoryBackend {
    fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        let slot = self
            .slot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(slot.clone())
    }

    fn persist(&self, pair: &TokenPair) -> Result<(), StoreError> {
        let mut slot = self
            .slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(pair.clone());
        Ok(())
    }

    fn wipe(&self) -> Result<(), StoreError> {
        let mut slot = self
            .slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
        Ok(())
    }
}

// ============================================================================
// Credential Store
// ============================================================================

/// Credential store: the in-memory pair with write-through persistence
///
/// Memory is the source of truth for reads. `set` updates memory before the
/// backend so concurrent callers always see the newest pair even when
/// persistence fails; `clear` empties memory before wiping the backend so a
/// failed wipe still leaves the process signed out.
pub struct CredentialStore {
    current: RwLock<Option<TokenPair>>,
    backend: Arc<dyn TokenBackend>,
}

impl CredentialStore {
    /// Create a store over the given backend, loading any persisted pair
    ///
    /// A backend that fails to load (or holds unreadable data) is treated as
    /// empty: the session simply starts signed out.
    #[must_use]
    pub fn new(backend: Arc<dyn TokenBackend>) -> Self {
        let current = match backend.load() {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load persisted credentials, starting signed out");
                None
            }
        };

        Self {
            current: RwLock::new(current),
            backend,
        }
    }

    /// Current access token, if signed in
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|p| p.access_token.clone())
    }

    /// Current refresh token, if signed in
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read().as_ref().map(|p| p.refresh_token.clone())
    }

    /// Current pair, if signed in
    #[must_use]
    pub fn token_pair(&self) -> Option<TokenPair> {
        self.read().clone()
    }

    /// Whether a credential pair is present
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.read().is_some()
    }

    /// Replace the stored pair, in memory and through the backend
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails. The in-memory pair is already
    /// updated at that point, so the session keeps working; only durability
    /// across a restart is lost.
    pub fn set(&self, pair: TokenPair) -> Result<(), StoreError> {
        *self.write() = Some(pair.clone());
        self.backend.persist(&pair)
    }

    /// Remove the stored pair, in memory and through the backend
    ///
    /// Clearing an already-empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to wipe. Memory is already
    /// cleared at that point.
    pub fn clear(&self) -> Result<(), StoreError> {
        *self.write() = None;
        self.backend.wipe()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<TokenPair>> {
        // Recover from poisoning; the pair inside is still coherent
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<TokenPair>> {
        self.current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair::new(access, refresh)
    }

    #[test]
    fn test_set_then_get_pair() {
        let store = CredentialStore::new(Arc::new(MemoryBackend::new()));
        assert!(!store.has_credentials());

        store.set(pair("access1", "refresh1")).unwrap();

        assert_eq!(store.access_token(), Some("access1".to_string()));
        assert_eq!(store.refresh_token(), Some("refresh1".to_string()));
        assert_eq!(store.token_pair(), Some(pair("access1", "refresh1")));
    }

    #[test]
    fn test_clear_removes_both_tokens() {
        let store = CredentialStore::new(Arc::new(MemoryBackend::new()));
        store.set(pair("access1", "refresh1")).unwrap();

        store.clear().unwrap();

        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert!(!store.has_credentials());
    }

    #[test]
    fn test_clear_empty_store_succeeds() {
        let store = CredentialStore::new(Arc::new(MemoryBackend::new()));

        store.clear().unwrap();
        store.clear().unwrap();

        assert!(!store.has_credentials());
    }

    #[test]
    fn test_set_replaces_previous_pair() {
        let store = CredentialStore::new(Arc::new(MemoryBackend::new()));
        store.set(pair("old_access", "old_refresh")).unwrap();

        store.set(pair("new_access", "new_refresh")).unwrap();

        assert_eq!(store.token_pair(), Some(pair("new_access", "new_refresh")));
    }

    #[test]
    fn test_file_backend_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");

        {
            let store = CredentialStore::new(Arc::new(FileBackend::with_path(path.clone())));
            store.set(pair("persisted_access", "persisted_refresh")).unwrap();
        }

        // A fresh store over the same path picks the pair back up
        let reloaded = CredentialStore::new(Arc::new(FileBackend::with_path(path)));
        assert_eq!(
            reloaded.token_pair(),
            Some(pair("persisted_access", "persisted_refresh"))
        );
    }

    #[test]
    fn test_file_backend_clear_deletes_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");

        let store = CredentialStore::new(Arc::new(FileBackend::with_path(path.clone())));
        store.set(pair("a", "r")).unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());

        let reloaded = CredentialStore::new(Arc::new(FileBackend::with_path(path)));
        assert!(!reloaded.has_credentials());
    }

    #[test]
    fn test_missing_file_means_signed_out() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        let store = CredentialStore::new(Arc::new(FileBackend::with_path(path)));
        assert!(!store.has_credentials());
    }

    #[test]
    fn test_unreadable_document_means_signed_out() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        std::fs::write(&path, "not json at all").unwrap();

        let store = CredentialStore::new(Arc::new(FileBackend::with_path(path)));
        assert!(!store.has_credentials());
    }

    #[test]
    fn test_memory_backend_shared_between_stores() {
        let backend = Arc::new(MemoryBackend::new());

        let first = CredentialStore::new(backend.clone() as Arc<dyn TokenBackend>);
        first.set(pair("shared_access", "shared_refresh")).unwrap();

        let second = CredentialStore::new(backend as Arc<dyn TokenBackend>);
        assert_eq!(
            second.token_pair(),
            Some(pair("shared_access", "shared_refresh"))
        );
    }

    #[test]
    fn test_file_backend_default_path() {
        let backend = FileBackend::new();
        assert!(backend.path().ends_with("echocheck/credentials.json"));
    }
}

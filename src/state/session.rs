//! Session store: the authentication credential and its durable slot.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session is the only state shared by the request gateway, the intake
//! wizard, the queue synchronizer and the route guard. Each holds an explicit
//! `Session` handle; only `login`/`logout` mutate it.
//!
//! DESIGN
//! ======
//! Durable storage is modeled on browser `localStorage` (string key/value),
//! so a file-backed store and an in-memory store are interchangeable. Storage
//! I/O failures are logged and never surface to callers: a lost credential
//! just means the operator logs in again.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{info, warn};

/// Storage key holding the bearer credential.
pub const TOKEN_STORAGE_KEY: &str = "token";

// =============================================================================
// STORAGE
// =============================================================================

/// Minimal durable key/value storage, shaped like `window.localStorage`.
pub trait CredentialStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// Process-local storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a credential, as if left by an earlier run.
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        let storage = Self::default();
        storage.set_item(TOKEN_STORAGE_KEY, token);
        storage
    }
}

impl CredentialStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items.borrow_mut().insert(key.to_owned(), value.to_owned());
    }

    fn remove_item(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }
}

/// JSON-object file store. A missing or corrupt file reads as empty.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "session file unreadable; treating as empty");
            BTreeMap::new()
        })
    }

    fn store(&self, items: &BTreeMap<String, String>) {
        if items.is_empty() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "failed to remove session file");
                }
            }
            return;
        }
        let raw = match serde_json::to_string_pretty(items) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to encode session file");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, raw) {
            warn!(path = %self.path.display(), error = %e, "failed to write session file");
        }
    }
}

impl CredentialStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set_item(&self, key: &str, value: &str) {
        let mut items = self.load();
        items.insert(key.to_owned(), value.to_owned());
        self.store(&items);
    }

    fn remove_item(&self, key: &str) {
        let mut items = self.load();
        if items.remove(key).is_some() {
            self.store(&items);
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

struct SessionInner {
    credential: RefCell<Option<String>>,
    storage: Box<dyn CredentialStorage>,
}

/// Shared handle to the session. Cloning shares the same credential.
#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

impl Session {
    /// Initialize from durable storage. The credential may be absent.
    pub fn restore(storage: impl CredentialStorage + 'static) -> Self {
        let credential = storage
            .get_item(TOKEN_STORAGE_KEY)
            .filter(|token| !token.trim().is_empty());
        Self {
            inner: Rc::new(SessionInner {
                credential: RefCell::new(credential),
                storage: Box::new(storage),
            }),
        }
    }

    /// A session backed by [`MemoryStorage`] with no credential.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::restore(MemoryStorage::new())
    }

    /// Store the credential in memory and durable storage.
    pub fn login(&self, credential: &str) {
        self.inner.storage.set_item(TOKEN_STORAGE_KEY, credential);
        *self.inner.credential.borrow_mut() = Some(credential.to_owned());
        info!("session authenticated");
    }

    /// Clear the credential from memory and durable storage.
    pub fn logout(&self) {
        self.inner.storage.remove_item(TOKEN_STORAGE_KEY);
        let previous = self.inner.credential.borrow_mut().take();
        if previous.is_some() {
            info!("session cleared");
        }
    }

    /// Derived from credential presence on every call.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.credential.borrow().is_some()
    }

    #[must_use]
    pub fn credential(&self) -> Option<String> {
        self.inner.credential.borrow().clone()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

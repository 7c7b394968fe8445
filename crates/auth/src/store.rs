//! Persistent token storage
//!
//! [`TokenStore`] is plain key/value string storage with no expiry logic.
//! Two implementations are provided:
//!
//! - [`MemoryTokenStore`]: process-local, for tests and the mock provider
//! - [`FileTokenStore`]: a JSON file that survives restarts and is shared by
//!   every process pointing at the same path (last write wins)
//!
//! ## File layout
//!
//! ```text
//! {
//!   "access_token": "<jwt>",
//!   "refresh_token": "<opaque>"
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Key/value storage for tokens.
///
/// Infallible by contract: implementations backed by fallible media log the
/// failure and behave as if the value were absent.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    fn remove(&self, key: &str);
}

/// In-memory TokenStore for testing and offline use.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with both tokens
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let store = Self::new();
        store.set(ACCESS_TOKEN_KEY, access);
        store.set(REFRESH_TOKEN_KEY, refresh);
        store
    }

    /// Snapshot of every stored key
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
    }
}

/// File-backed TokenStore.
///
/// Every operation re-reads the file so writes from other processes are
/// visible immediately. The in-process mutex only serialises
/// read-modify-write cycles within this process.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> libris_common::Result<BTreeMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> libris_common::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        // Uniquely named sibling, renamed over the target so readers never see a torn file
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(values)?)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn update<F>(&self, key: &str, apply: F)
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Token file unreadable, starting from empty"
                );
                BTreeMap::new()
            }
        };

        apply(&mut values);

        if let Err(e) = self.write_all(&values) {
            tracing::warn!(
                path = %self.path.display(),
                key,
                error = %e,
                "Failed to persist token file"
            );
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_all() {
            Ok(mut values) => values.remove(key),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    key,
                    error = %e,
                    "Failed to read token file"
                );
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        self.update(key, |values| {
            values.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        self.update(key, |values| {
            values.remove(key);
        });
    }
}

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOKEN_KEY: &str = "token";
pub const TOAST_MESSAGE_KEY: &str = "toastMessage";
pub const TOAST_TYPE_KEY: &str = "toastType";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read storage file: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write storage file: {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse storage file: {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize storage entries: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

/// String key/value storage with the semantics of the browser's
/// `localStorage` / `sessionStorage`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

fn lock_entries(entries: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    entries.lock().unwrap_or_else(|e| e.into_inner())
}

/// Storage that lives as long as the process; used for session scope.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock_entries(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock_entries(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock_entries(&self.entries).remove(key);
        Ok(())
    }
}

/// Persistent storage backed by a JSON object on disk. Every write rewrites
/// the whole file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| StorageError::Parse {
                    path: path.display().to_string(),
                    source: e,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(StorageError::Read {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let write_err = |e| StorageError::Write {
            path: self.path.display().to_string(),
            source: e,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let contents =
            serde_json::to_string_pretty(entries).map_err(|e| StorageError::Serialize { source: e })?;
        write_private(&self.path, contents.as_bytes()).map_err(write_err)
    }
}

/// Writes `contents` readable by the owner only; the file holds the auth token.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock_entries(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = lock_entries(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = lock_entries(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
}

impl ToastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A notification queued for display after the next page load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
}

impl Toast {
    pub fn success(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: ToastKind::Success,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: ToastKind::Error,
        }
    }

    pub fn store(&self, session: &dyn KeyValueStore) -> Result<(), StorageError> {
        session.set(TOAST_MESSAGE_KEY, &self.message)?;
        session.set(TOAST_TYPE_KEY, self.kind.as_str())
    }

    pub fn peek(session: &dyn KeyValueStore) -> Option<Toast> {
        let message = session.get(TOAST_MESSAGE_KEY)?;
        let kind = ToastKind::parse(&session.get(TOAST_TYPE_KEY)?)?;
        Some(Toast { message, kind })
    }

    /// Reads the queued toast and clears both flags so it is shown once.
    pub fn take(session: &dyn KeyValueStore) -> Result<Option<Toast>, StorageError> {
        let toast = Self::peek(session);
        session.remove(TOAST_MESSAGE_KEY)?;
        session.remove(TOAST_TYPE_KEY)?;
        Ok(toast)
    }
}

//! Durable storage for the signed-in identity.
//!
//! One serialized `(token, user)` pair lives under a fixed key. It is read
//! once at startup, rewritten on every login and removed on logout.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use stringr_shared::User;
use thiserror::Error;

/// Key the identity is stored under
pub const STORAGE_KEY: &str = "pb_auth";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAuth {
    pub token: String,
    pub model: User,
}

#[derive(Error, Debug)]
pub enum AuthStoreError {
    #[error("Could not determine a data directory for auth storage")]
    DetermineDataDir,
    #[error("Error creating auth storage directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error reading stored auth from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error writing stored auth to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error removing stored auth at {path}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error serializing auth for storage")]
    Serialize(#[source] serde_json::Error),
    #[error("Stored auth in {path} is malformed")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Auth storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence for the identity.
///
/// Calls may block on I/O; the session runs them off the async executor.
pub trait AuthStore: Send + Sync + 'static {
    /// `None` when nothing was stored
    fn load(&self) -> Result<Option<StoredAuth>, AuthStoreError>;
    fn save(&self, auth: &StoredAuth) -> Result<(), AuthStoreError>;
    /// Clearing an empty store is not an error
    fn clear(&self) -> Result<(), AuthStoreError>;
}

/// JSON file `<data dir>/pb_auth.json`
#[derive(Debug, Clone)]
pub struct FileAuthStore {
    path: PathBuf,
}

impl FileAuthStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The per-user data directory for this app
    pub fn default_path() -> Result<PathBuf, AuthStoreError> {
        let dirs = ProjectDirs::from("com", "stringr", "stringr")
            .ok_or(AuthStoreError::DetermineDataDir)?;
        Ok(dirs.data_dir().join(format!("{STORAGE_KEY}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuthStore for FileAuthStore {
    fn load(&self) -> Result<Option<StoredAuth>, AuthStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AuthStoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| AuthStoreError::Deserialize {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, auth: &StoredAuth) -> Result<(), AuthStoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| AuthStoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string(auth).map_err(AuthStoreError::Serialize)?;
        std::fs::write(&self.path, content).map_err(|source| AuthStoreError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn clear(&self) -> Result<(), AuthStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AuthStoreError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// In-process store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryAuthStore {
    slot: Mutex<Option<StoredAuth>>,
    unavailable: bool,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth(auth: StoredAuth) -> Self {
        Self {
            slot: Mutex::new(Some(auth)),
            unavailable: false,
        }
    }

    /// A store whose every operation fails
    pub fn unavailable() -> Self {
        Self {
            slot: Mutex::new(None),
            unavailable: true,
        }
    }

    /// Current contents, bypassing the failure mode
    pub fn snapshot(&self) -> Option<StoredAuth> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn check(&self) -> Result<(), AuthStoreError> {
        if self.unavailable {
            Err(AuthStoreError::Unavailable("memory store disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl AuthStore for MemoryAuthStore {
    fn load(&self) -> Result<Option<StoredAuth>, AuthStoreError> {
        self.check()?;
        Ok(self.snapshot())
    }

    fn save(&self, auth: &StoredAuth) -> Result<(), AuthStoreError> {
        self.check()?;
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(auth.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthStoreError> {
        self.check()?;
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

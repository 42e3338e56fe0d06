//! Locally persisted bearer credential
//!
//! The backend issues its own bearer token in exchange for the identity
//! provider's credential. It survives restarts in a small file and is removed
//! on sign-out.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone)]
enum Backing {
    File(PathBuf),
    Memory(Arc<Mutex<Option<String>>>),
}

/// Storage for the persisted backend token
#[derive(Debug, Clone)]
pub struct CredentialStore {
    backing: Backing,
}

impl CredentialStore {
    /// Store backed by a file on disk
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backing: Backing::File(path.into()),
        }
    }

    /// Volatile store, lost when the process exits
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory(Arc::new(Mutex::new(None))),
        }
    }

    /// Read the persisted token, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read
    pub fn load(&self) -> Result<Option<String>, CredentialError> {
        match &self.backing {
            Backing::File(path) => match std::fs::read_to_string(path) {
                Ok(contents) => {
                    let token = contents.trim();
                    Ok((!token.is_empty()).then(|| token.to_string()))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            },
            Backing::Memory(cell) => Ok(cell.lock().map_err(|_| CredentialError::Poisoned)?.clone()),
        }
    }

    /// Persist a token, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be written
    pub fn store(&self, token: &str) -> Result<(), CredentialError> {
        match &self.backing {
            Backing::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, token)?;
                Ok(())
            }
            Backing::Memory(cell) => {
                *cell.lock().map_err(|_| CredentialError::Poisoned)? = Some(token.to_string());
                Ok(())
            }
        }
    }

    /// Remove the persisted token; a missing token is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed
    pub fn clear(&self) -> Result<(), CredentialError> {
        match &self.backing {
            Backing::File(path) => match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            Backing::Memory(cell) => {
                *cell.lock().map_err(|_| CredentialError::Poisoned)? = None;
                Ok(())
            }
        }
    }

    /// Path of the backing file, if file-backed
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File(path) => Some(path),
            Backing::Memory(_) => None,
        }
    }
}

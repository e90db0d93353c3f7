use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub const MIN_NAME_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("Name is required")]
    Required,
    #[error("Name must be at least 2 characters")]
    TooShort,
}

/// Trims a display name and rejects ones too short to show.
pub fn validate_name(name: &str) -> Result<String, NameError> {
    let name = name.trim();
    match name.chars().count() {
        0 => Err(NameError::Required),
        n if n < MIN_NAME_LEN => Err(NameError::TooShort),
        _ => Ok(name.to_string()),
    }
}

/// Single-key store for the player's display name, backed by one file.
#[derive(Debug, Clone)]
pub struct NameStore {
    path: PathBuf,
}

impl NameStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored name, or an empty string when nothing readable is stored.
    pub fn get(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents.trim().to_string(),
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    debug!("Could not read {}: {}", self.path.display(), e);
                }
                String::new()
            }
        }
    }

    pub fn set(&self, name: &str) -> Result<(), StorageError> {
        std::fs::write(&self.path, name.trim()).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

//! Output store: writes exported files under a root directory.

use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot write outside the output directory: {path}")]
    UnsafePath { path: String },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output: {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination of exported files. `path` is relative and `/`-separated.
pub trait OutputStore {
    /// Write `content` at `path`, creating missing directories and replacing any existing file.
    /// Returns where the file ended up.
    fn write(&mut self, path: &str, content: &[u8]) -> Result<PathBuf, StoreError>;

    /// Delete the file at `path`. A file that does not exist is not an error.
    fn remove(&mut self, path: &str) -> Result<(), StoreError>;
}

/// Writes into a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(StoreError::UnsafePath {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl OutputStore for DirStore {
    fn write(&mut self, path: &str, content: &[u8]) -> Result<PathBuf, StoreError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(&target, content).map_err(|e| StoreError::Write {
            path: target.clone(),
            source: e,
        })?;
        Ok(target)
    }

    fn remove(&mut self, path: &str) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(StoreError::Remove {
                path: target,
                source: e,
            }),
            _ => Ok(()),
        }
    }
}

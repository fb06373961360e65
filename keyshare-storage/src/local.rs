//! `FileView` over a directory on the local disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::path::{is_within, normalize_path};
use crate::view::{DirEntry, FileView};

/// Maps the view's absolute paths onto a root directory.
#[derive(Clone, Debug)]
pub struct LocalView {
    root: PathBuf,
}

impl LocalView {
    /// Opens a view rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> StorageResult<(String, PathBuf)> {
        let normalized = normalize_path(path)?;
        let local = self.root.join(normalized.trim_start_matches('/'));
        Ok((normalized, local))
    }
}

fn map_io(path: &str, err: std::io::Error) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
        ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.to_string()),
        _ => StorageError::Io(err),
    }
}

impl FileView for LocalView {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|(_, p)| p.exists())
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|(_, p)| p.is_dir())
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let (path, local) = self.resolve(path)?;
        if local.is_dir() {
            return Err(StorageError::IsADirectory(path));
        }
        fs::read(&local).map_err(|e| map_io(&path, e))
    }

    fn write(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let (path, local) = self.resolve(path)?;
        if local.is_dir() {
            return Err(StorageError::IsADirectory(path));
        }
        fs::write(&local, data).map_err(|e| map_io(&path, e))
    }

    fn mkdir_all(&self, path: &str) -> StorageResult<()> {
        let (path, local) = self.resolve(path)?;
        if local.is_file() {
            return Err(StorageError::NotADirectory(path));
        }
        fs::create_dir_all(&local).map_err(|e| map_io(&path, e))
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let (from, from_local) = self.resolve(from)?;
        let (to, to_local) = self.resolve(to)?;
        if from == to {
            return Ok(());
        }
        if from == "/" || is_within(&to, &from) {
            return Err(StorageError::InvalidPath(to));
        }
        if !from_local.exists() {
            return Err(StorageError::NotFound(from));
        }
        if to_local.is_dir() {
            return Err(StorageError::AlreadyExists(to));
        }
        debug!(%from, %to, "renaming");
        fs::rename(&from_local, &to_local).map_err(|e| map_io(&to, e))
    }

    fn unlink(&self, path: &str) -> StorageResult<()> {
        let (path, local) = self.resolve(path)?;
        if local.is_dir() {
            return Err(StorageError::IsADirectory(path));
        }
        fs::remove_file(&local).map_err(|e| map_io(&path, e))
    }

    fn remove_dir_all(&self, path: &str) -> StorageResult<()> {
        let (path, local) = self.resolve(path)?;
        if path == "/" {
            return Err(StorageError::InvalidPath(path));
        }
        if local.is_file() {
            return Err(StorageError::NotADirectory(path));
        }
        debug!(%path, "removing directory tree");
        fs::remove_dir_all(&local).map_err(|e| map_io(&path, e))
    }

    fn list_dir(&self, path: &str) -> StorageResult<Vec<DirEntry>> {
        let (path, local) = self.resolve(path)?;
        if local.is_file() {
            return Err(StorageError::NotADirectory(path));
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&local).map_err(|e| map_io(&path, e))? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

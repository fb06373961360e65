//! The `FileView` trait: the hierarchical namespace every other layer uses.

use crate::error::StorageResult;

/// One child of a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Hierarchical file store over absolute, slash-separated paths.
///
/// All paths are normalized by the implementation. `write` requires the
/// parent directory to exist; callers create it with `mkdir_all`.
pub trait FileView: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    fn is_dir(&self, path: &str) -> bool;

    /// Reads a whole file.
    fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Creates or replaces a file.
    fn write(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Creates a directory and any missing ancestors.
    fn mkdir_all(&self, path: &str) -> StorageResult<()>;

    /// Moves a file or a whole directory tree. An existing target file is
    /// replaced; an existing target directory is an error.
    fn rename(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Removes a single file.
    fn unlink(&self, path: &str) -> StorageResult<()>;

    /// Removes a directory and everything below it.
    fn remove_dir_all(&self, path: &str) -> StorageResult<()>;

    /// Lists the direct children of a directory, sorted by name.
    fn list_dir(&self, path: &str) -> StorageResult<Vec<DirEntry>>;

    /// Reads a file, mapping absence to `None`.
    fn read_optional(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        match self.read(path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Removes a file if present. Returns whether anything was removed.
    fn unlink_if_exists(&self, path: &str) -> StorageResult<bool> {
        match self.unlink(path) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

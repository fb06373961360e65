//! In-memory `FileView`, used by tests and embedders without a disk.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{StorageError, StorageResult};
use crate::path::{basename, dirname, is_within, normalize_path};
use crate::view::{DirEntry, FileView};

#[derive(Clone, Debug)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// A `FileView` kept entirely in a map keyed by normalized path.
///
/// Every mutation that changes state bumps a counter, which lets callers
/// assert that an operation was a no-op.
#[derive(Debug, Default)]
pub struct MemoryView {
    nodes: RwLock<BTreeMap<String, Node>>,
    mutations: AtomicU64,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of state-changing operations performed so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    fn nodes(&self) -> StorageResult<RwLockReadGuard<'_, BTreeMap<String, Node>>> {
        self.nodes.read().map_err(|_| StorageError::Lock)
    }

    fn nodes_mut(&self) -> StorageResult<RwLockWriteGuard<'_, BTreeMap<String, Node>>> {
        self.nodes.write().map_err(|_| StorageError::Lock)
    }

    fn bump(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn require_dir(nodes: &BTreeMap<String, Node>, dir: &str) -> StorageResult<()> {
        if dir == "/" {
            return Ok(());
        }
        match nodes.get(dir) {
            Some(Node::Dir) => Ok(()),
            Some(Node::File(_)) => Err(StorageError::NotADirectory(dir.to_string())),
            None => Err(StorageError::NotFound(dir.to_string())),
        }
    }

    fn descendants(nodes: &BTreeMap<String, Node>, root: &str) -> Vec<String> {
        let prefix = format!("{root}/");
        nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl FileView for MemoryView {
    fn exists(&self, path: &str) -> bool {
        let Ok(path) = normalize_path(path) else {
            return false;
        };
        path == "/" || self.nodes().map(|n| n.contains_key(&path)).unwrap_or(false)
    }

    fn is_dir(&self, path: &str) -> bool {
        let Ok(path) = normalize_path(path) else {
            return false;
        };
        path == "/"
            || self
                .nodes()
                .map(|n| matches!(n.get(&path), Some(Node::Dir)))
                .unwrap_or(false)
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let path = normalize_path(path)?;
        match self.nodes()?.get(&path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(StorageError::IsADirectory(path)),
            None if path == "/" => Err(StorageError::IsADirectory(path)),
            None => Err(StorageError::NotFound(path)),
        }
    }

    fn write(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let path = normalize_path(path)?;
        if path == "/" {
            return Err(StorageError::IsADirectory(path));
        }
        let mut nodes = self.nodes_mut()?;
        Self::require_dir(&nodes, dirname(&path))?;
        if let Some(Node::Dir) = nodes.get(&path) {
            return Err(StorageError::IsADirectory(path));
        }
        nodes.insert(path, Node::File(data.to_vec()));
        self.bump();
        Ok(())
    }

    fn mkdir_all(&self, path: &str) -> StorageResult<()> {
        let path = normalize_path(path)?;
        let mut nodes = self.nodes_mut()?;
        let mut current = String::new();
        for segment in crate::path::segments(&path) {
            current.push('/');
            current.push_str(segment);
            match nodes.get(&current) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(StorageError::NotADirectory(current)),
                None => {
                    nodes.insert(current.clone(), Node::Dir);
                    self.bump();
                }
            }
        }
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let from = normalize_path(from)?;
        let to = normalize_path(to)?;
        if from == to {
            return Ok(());
        }
        if from == "/" || is_within(&to, &from) {
            return Err(StorageError::InvalidPath(to));
        }
        let mut nodes = self.nodes_mut()?;
        let Some(node) = nodes.get(&from).cloned() else {
            return Err(StorageError::NotFound(from));
        };
        Self::require_dir(&nodes, dirname(&to))?;
        if let Some(Node::Dir) = nodes.get(&to) {
            return Err(StorageError::AlreadyExists(to));
        }

        let moved = Self::descendants(&nodes, &from);
        nodes.remove(&from);
        nodes.insert(to.clone(), node);
        for old in moved {
            if let Some(child) = nodes.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                nodes.insert(new, child);
            }
        }
        self.bump();
        Ok(())
    }

    fn unlink(&self, path: &str) -> StorageResult<()> {
        let path = normalize_path(path)?;
        let mut nodes = self.nodes_mut()?;
        match nodes.get(&path) {
            Some(Node::File(_)) => {
                nodes.remove(&path);
                self.bump();
                Ok(())
            }
            Some(Node::Dir) => Err(StorageError::IsADirectory(path)),
            None => Err(StorageError::NotFound(path)),
        }
    }

    fn remove_dir_all(&self, path: &str) -> StorageResult<()> {
        let path = normalize_path(path)?;
        if path == "/" {
            return Err(StorageError::InvalidPath(path));
        }
        let mut nodes = self.nodes_mut()?;
        match nodes.get(&path) {
            Some(Node::Dir) => {
                for child in Self::descendants(&nodes, &path) {
                    nodes.remove(&child);
                }
                nodes.remove(&path);
                self.bump();
                Ok(())
            }
            Some(Node::File(_)) => Err(StorageError::NotADirectory(path)),
            None => Err(StorageError::NotFound(path)),
        }
    }

    fn list_dir(&self, path: &str) -> StorageResult<Vec<DirEntry>> {
        let path = normalize_path(path)?;
        let nodes = self.nodes()?;
        Self::require_dir(&nodes, &path)?;
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('/'))
            .map(|(k, node)| DirEntry {
                name: basename(k).to_string(),
                is_dir: matches!(node, Node::Dir),
            })
            .collect())
    }
}

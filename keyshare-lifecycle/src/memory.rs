//! In-memory catalog, sharing registry, group directory and settings.
//!
//! Enough bookkeeping to drive the lifecycle end to end without a host
//! application: file ids with owners and optional mount points, share
//! records with parents, groups and a flat settings map.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use keyshare_storage::path::{is_within, normalize_path, relative_to};
use keyshare_storage::StorageError;

use crate::directory::{FileCatalog, GroupDirectory, SettingsStore, ShareRegistry};
use crate::error::{KeyError, KeyResult};
use crate::types::{FileId, GroupId, ItemType, ShareGrant, ShareId, ShareRecord, UserId};

#[derive(Clone, Debug)]
struct FileEntry {
    owner: UserId,
    /// Path in the owner's file tree, mount point included.
    path: String,
    /// Path inside the external mount, for mounted files.
    storage_path: Option<String>,
    unencrypted_size: Option<u64>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    next_file: u64,
    next_share: u64,
    files: BTreeMap<FileId, FileEntry>,
    shares: BTreeMap<ShareId, ShareRecord>,
    groups: BTreeMap<GroupId, BTreeSet<UserId>>,
}

impl DirectoryState {
    fn find_file(&self, owner: &UserId, path: &str) -> Option<FileId> {
        self.files
            .iter()
            .find(|(_, e)| &e.owner == owner && e.path == path)
            .map(|(id, _)| *id)
    }

    fn grant_reaches(&self, grant: &ShareGrant, user: &UserId) -> bool {
        match grant {
            ShareGrant::User(u) => u == user,
            ShareGrant::Group(g) => self.groups.get(g).is_some_and(|m| m.contains(user)),
            ShareGrant::Link => false,
        }
    }
}

/// In-memory [`FileCatalog`], [`ShareRegistry`] and [`GroupDirectory`].
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> KeyResult<RwLockReadGuard<'_, DirectoryState>> {
        self.state.read().map_err(|_| StorageError::Lock.into())
    }

    fn state_mut(&self) -> KeyResult<RwLockWriteGuard<'_, DirectoryState>> {
        self.state.write().map_err(|_| StorageError::Lock.into())
    }

    /// Registers a file or folder in `owner`'s tree, returning its id.
    /// Registering the same path twice returns the existing id.
    pub fn add_file(&self, owner: &UserId, path: &str) -> KeyResult<FileId> {
        self.insert_file(owner, path, None)
    }

    /// Registers a file living on externally mounted storage.
    ///
    /// `path` is the path in the owner's tree (mount point included),
    /// `storage_path` the path inside the mount.
    pub fn add_file_mounted(
        &self,
        owner: &UserId,
        path: &str,
        storage_path: &str,
    ) -> KeyResult<FileId> {
        self.insert_file(owner, path, Some(normalize_path(storage_path)?))
    }

    fn insert_file(
        &self,
        owner: &UserId,
        path: &str,
        storage_path: Option<String>,
    ) -> KeyResult<FileId> {
        let path = normalize_path(path)?;
        let mut state = self.state_mut()?;
        if let Some(id) = state.find_file(owner, &path) {
            return Ok(id);
        }
        state.next_file += 1;
        let id = FileId(state.next_file);
        state.files.insert(
            id,
            FileEntry {
                owner: owner.clone(),
                path,
                storage_path,
                unencrypted_size: None,
            },
        );
        Ok(id)
    }

    pub fn file_id(&self, owner: &UserId, path: &str) -> KeyResult<Option<FileId>> {
        let path = normalize_path(path)?;
        Ok(self.state()?.find_file(owner, &path))
    }

    /// Follows a rename in the owner's tree, including every descendant.
    pub fn move_path(&self, owner: &UserId, old: &str, new: &str) -> KeyResult<()> {
        let old = normalize_path(old)?;
        let new = normalize_path(new)?;
        let mut state = self.state_mut()?;
        for entry in state.files.values_mut() {
            if &entry.owner != owner || !is_within(&entry.path, &old) {
                continue;
            }
            let moved = match relative_to(&entry.path, &old) {
                Some(rel) if !rel.is_empty() => format!("{new}/{rel}"),
                _ => new.clone(),
            };
            entry.path = moved;
        }
        Ok(())
    }

    pub fn unencrypted_size(&self, owner: &UserId, path: &str) -> KeyResult<Option<u64>> {
        let path = normalize_path(path)?;
        let state = self.state()?;
        Ok(state
            .find_file(owner, &path)
            .and_then(|id| state.files.get(&id))
            .and_then(|e| e.unencrypted_size))
    }

    pub fn add_group(&self, group: &GroupId, members: &[UserId]) -> KeyResult<()> {
        self.state_mut()?
            .groups
            .insert(group.clone(), members.iter().cloned().collect());
        Ok(())
    }

    pub fn remove_from_group(&self, group: &GroupId, user: &UserId) -> KeyResult<()> {
        if let Some(members) = self.state_mut()?.groups.get_mut(group) {
            members.remove(user);
        }
        Ok(())
    }

    /// Records a new share and returns it.
    pub fn add_share(
        &self,
        shared_by: &UserId,
        item_source: FileId,
        item_type: ItemType,
        grant: ShareGrant,
        file_target: &str,
        parent: Option<ShareId>,
    ) -> KeyResult<ShareRecord> {
        let mut state = self.state_mut()?;
        if !state.files.contains_key(&item_source) {
            return Err(KeyError::FileNotFound(format!("file id {}", item_source.0)));
        }
        state.next_share += 1;
        let record = ShareRecord {
            id: ShareId(state.next_share),
            parent,
            item_type,
            item_source,
            file_target: normalize_path(file_target)?,
            grant,
            shared_by: shared_by.clone(),
        };
        state.shares.insert(record.id, record.clone());
        Ok(record)
    }

    pub fn remove_share(&self, id: ShareId) -> KeyResult<ShareRecord> {
        self.state_mut()?
            .shares
            .remove(&id)
            .ok_or_else(|| KeyError::ShareNotFound(id.to_string()))
    }
}

impl FileCatalog for MemoryDirectory {
    fn file_id_to_path(&self, id: FileId) -> KeyResult<Option<(UserId, String)>> {
        Ok(self.state()?.files.get(&id).map(|e| {
            let path = e.storage_path.clone().unwrap_or_else(|| e.path.clone());
            (e.owner.clone(), path)
        }))
    }

    fn path_with_mount_point(&self, id: FileId) -> KeyResult<Option<String>> {
        Ok(self.state()?.files.get(&id).map(|e| e.path.clone()))
    }

    fn record_unencrypted_size(&self, owner: &UserId, path: &str, size: u64) -> KeyResult<()> {
        let path = normalize_path(path)?;
        let mut state = self.state_mut()?;
        if let Some(id) = state.find_file(owner, &path) {
            if let Some(entry) = state.files.get_mut(&id) {
                entry.unencrypted_size = Some(size);
            }
        }
        Ok(())
    }
}

impl ShareRegistry for MemoryDirectory {
    fn share_by_id(&self, id: ShareId) -> KeyResult<Option<ShareRecord>> {
        Ok(self.state()?.shares.get(&id).cloned())
    }

    fn shares_for_path(&self, owner: &UserId, path: &str) -> KeyResult<Vec<ShareRecord>> {
        let state = self.state()?;
        let Some(id) = state.find_file(owner, path) else {
            return Ok(Vec::new());
        };
        Ok(state
            .shares
            .values()
            .filter(|s| s.item_source == id)
            .cloned()
            .collect())
    }

    fn resolve_owner(&self, actor: &UserId, path: &str) -> KeyResult<(UserId, String)> {
        let path = normalize_path(path)?;
        let Some(rest) = relative_to(&path, "/Shared") else {
            return Ok((actor.clone(), path));
        };
        let (target, sub) = rest.split_once('/').unwrap_or((rest, ""));
        if target.is_empty() {
            return Err(KeyError::FileNotFound(path));
        }
        let state = self.state()?;
        let share = state
            .shares
            .values()
            .find(|s| s.target_name() == target && state.grant_reaches(&s.grant, actor))
            .ok_or_else(|| KeyError::FileNotFound(path.clone()))?;
        let entry = state
            .files
            .get(&share.item_source)
            .ok_or_else(|| KeyError::FileNotFound(path.clone()))?;
        let owner_path = if sub.is_empty() {
            entry.path.clone()
        } else {
            format!("{}/{sub}", entry.path)
        };
        Ok((entry.owner.clone(), owner_path))
    }
}

impl GroupDirectory for MemoryDirectory {
    fn group_members(&self, group: &GroupId) -> KeyResult<Vec<UserId>> {
        Ok(self
            .state()?
            .groups
            .get(group)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// In-memory [`SettingsStore`].
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> KeyResult<Option<String>> {
        let values = self.values.read().map_err(|_| StorageError::Lock)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> KeyResult<()> {
        let mut values = self.values.write().map_err(|_| StorageError::Lock)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

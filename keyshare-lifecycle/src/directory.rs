//! Collaborator seams onto the host's catalog, sharing and user systems.

use crate::error::KeyResult;
use crate::types::{FileId, GroupId, ShareId, ShareRecord, UserId};

/// Settings key holding the recovery key-pair id.
pub const RECOVERY_KEY_ID_SETTING: &str = "recoveryKeyId";

/// Settings key holding the administrator's recovery switch (`"1"`/`"0"`).
pub const RECOVERY_ADMIN_ENABLED_SETTING: &str = "recoveryAdminEnabled";

/// File identity and metadata.
pub trait FileCatalog: Send + Sync {
    /// Owner and storage path of a file id.
    ///
    /// For files on externally mounted storage the path is relative to the
    /// mount, not to the owner's file tree.
    fn file_id_to_path(&self, id: FileId) -> KeyResult<Option<(UserId, String)>>;

    /// Path of a file id as seen in its owner's file tree, mount point
    /// included.
    fn path_with_mount_point(&self, id: FileId) -> KeyResult<Option<String>>;

    /// Records the plaintext size of an encrypted file.
    fn record_unencrypted_size(&self, owner: &UserId, path: &str, size: u64) -> KeyResult<()>;
}

/// Read access to the sharing subsystem's records.
pub trait ShareRegistry: Send + Sync {
    fn share_by_id(&self, id: ShareId) -> KeyResult<Option<ShareRecord>>;

    /// Every share whose item is exactly `path` in `owner`'s tree.
    fn shares_for_path(&self, owner: &UserId, path: &str) -> KeyResult<Vec<ShareRecord>>;

    /// Maps a path in `actor`'s view (possibly under `/Shared`) to the
    /// owning user and the path in the owner's tree.
    fn resolve_owner(&self, actor: &UserId, path: &str) -> KeyResult<(UserId, String)>;
}

pub trait GroupDirectory: Send + Sync {
    fn group_members(&self, group: &GroupId) -> KeyResult<Vec<UserId>>;
}

/// Persistent application settings.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> KeyResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> KeyResult<()>;
}

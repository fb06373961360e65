//! Lifecycle events and hook outcomes.

use serde::{Deserialize, Serialize};

use crate::types::{FileId, ItemType, ShareGrant, ShareId, ShareRecord, UserId};

/// A share about to be created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub item_type: ItemType,
    pub item_source: FileId,
    pub grant: ShareGrant,
    pub uid_owner: UserId,
}

/// A share that was just created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEvent {
    pub id: ShareId,
    pub parent: Option<ShareId>,
    pub item_type: ItemType,
    pub item_source: FileId,
    pub grant: ShareGrant,
    pub file_target: String,
    /// The sharing user; the re-sharer for re-shares.
    pub uid_owner: UserId,
}

/// A share that was just removed. Carries no file target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnshareEvent {
    pub item_type: ItemType,
    pub item_source: FileId,
    pub grant: ShareGrant,
    pub uid_owner: UserId,
    pub item_parent: Option<ShareId>,
}

impl From<&ShareRecord> for ShareRequest {
    fn from(record: &ShareRecord) -> Self {
        Self {
            item_type: record.item_type,
            item_source: record.item_source,
            grant: record.grant.clone(),
            uid_owner: record.shared_by.clone(),
        }
    }
}

impl From<&ShareRecord> for ShareEvent {
    fn from(record: &ShareRecord) -> Self {
        Self {
            id: record.id,
            parent: record.parent,
            item_type: record.item_type,
            item_source: record.item_source,
            grant: record.grant.clone(),
            file_target: record.file_target.clone(),
            uid_owner: record.shared_by.clone(),
        }
    }
}

impl From<&ShareRecord> for UnshareEvent {
    fn from(record: &ShareRecord) -> Self {
        Self {
            item_type: record.item_type,
            item_source: record.item_source,
            grant: record.grant.clone(),
            uid_owner: record.shared_by.clone(),
            item_parent: record.parent,
        }
    }
}

/// Every event the key lifecycle reacts to.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Login {
        uid: UserId,
        password: String,
    },
    /// Self-service when the session is unlocked for `uid`, administrator
    /// reset otherwise.
    PasswordChanged {
        uid: UserId,
        password: String,
        recovery_password: Option<String>,
    },
    UserCreated {
        uid: UserId,
        password: String,
    },
    UserDeleted {
        uid: UserId,
    },
    PreShare(ShareRequest),
    Shared(ShareEvent),
    Unshared(UnshareEvent),
    Renamed {
        uid: UserId,
        old_path: String,
        new_path: String,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Login { .. } => "login",
            LifecycleEvent::PasswordChanged { .. } => "password_changed",
            LifecycleEvent::UserCreated { .. } => "user_created",
            LifecycleEvent::UserDeleted { .. } => "user_deleted",
            LifecycleEvent::PreShare(_) => "pre_share",
            LifecycleEvent::Shared(_) => "shared",
            LifecycleEvent::Unshared(_) => "unshared",
            LifecycleEvent::Renamed { .. } => "renamed",
        }
    }
}

/// Why the triggering action must be aborted. Deliberately carries no
/// internal detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    LoginFailed,
    PasswordChangeFailed,
    RecoveryRejected,
    UserSetupFailed,
    UserCleanupFailed,
    SharingFailed,
    RenameFailed,
}

/// Result of dispatching one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    /// Dispatch was suspended; the handler did not run.
    Suppressed,
    Abort(AbortReason),
}

impl HookOutcome {
    pub fn is_abort(&self) -> bool {
        matches!(self, HookOutcome::Abort(_))
    }
}

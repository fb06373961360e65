//! Routes lifecycle events to their handlers.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{KeyError, KeyResult};
use crate::events::{AbortReason, HookOutcome, LifecycleEvent};
use crate::hooks::KeyLifecycle;
use crate::session::Session;

/// Entry point for the host's event bus.
#[derive(Clone)]
pub struct EventDispatcher {
    lifecycle: Arc<KeyLifecycle>,
}

impl EventDispatcher {
    pub fn new(lifecycle: Arc<KeyLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub fn lifecycle(&self) -> &Arc<KeyLifecycle> {
        &self.lifecycle
    }

    /// Runs the handler for `event`.
    ///
    /// Events raised from inside the lifecycle's own housekeeping (the
    /// calling thread holds a suspension) are suppressed. A login or
    /// password change is never skipped silently: raised there it aborts,
    /// so no session proceeds without its keys.
    pub fn dispatch(&self, session: &mut Session, event: &LifecycleEvent) -> HookOutcome {
        if self.lifecycle.interception().is_suspended() {
            let reason = match event {
                LifecycleEvent::Login { .. } => AbortReason::LoginFailed,
                LifecycleEvent::PasswordChanged { .. } => AbortReason::PasswordChangeFailed,
                _ => {
                    debug!("suppressed {} event", event.name());
                    return HookOutcome::Suppressed;
                }
            };
            error!("{} raised during housekeeping; aborting", event.name());
            return HookOutcome::Abort(reason);
        }
        debug!("dispatching {} event", event.name());

        let lc = &self.lifecycle;
        let (result, reason): (KeyResult<()>, AbortReason) = match event {
            LifecycleEvent::Login { uid, password } => (
                lc.login(session, uid, password).map(drop),
                AbortReason::LoginFailed,
            ),
            LifecycleEvent::PasswordChanged {
                uid,
                password,
                recovery_password,
            } => (
                lc.set_passphrase(session, uid, password, recovery_password.as_deref())
                    .map(drop),
                AbortReason::PasswordChangeFailed,
            ),
            LifecycleEvent::UserCreated { uid, password } => (
                lc.post_create_user(uid, password).map(drop),
                AbortReason::UserSetupFailed,
            ),
            LifecycleEvent::UserDeleted { uid } => (
                lc.post_delete_user(uid).map(drop),
                AbortReason::UserCleanupFailed,
            ),
            LifecycleEvent::PreShare(request) => {
                (lc.pre_share(request), AbortReason::SharingFailed)
            }
            LifecycleEvent::Shared(share) => (
                lc.post_share(session, share).map(drop),
                AbortReason::SharingFailed,
            ),
            LifecycleEvent::Unshared(unshare) => (
                lc.post_unshare(unshare).map(drop),
                AbortReason::SharingFailed,
            ),
            LifecycleEvent::Renamed {
                uid,
                old_path,
                new_path,
            } => (
                lc.post_rename(session, uid, old_path, new_path).map(drop),
                AbortReason::RenameFailed,
            ),
        };

        match result {
            Ok(()) => HookOutcome::Continue,
            Err(KeyError::RecoveryVerificationFailure) => {
                error!("{} aborted: recovery passphrase rejected", event.name());
                HookOutcome::Abort(AbortReason::RecoveryRejected)
            }
            Err(e) => {
                error!("{} aborted: {e}", event.name());
                HookOutcome::Abort(reason)
            }
        }
    }
}

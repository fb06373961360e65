//! Share-key reconciliation.
//!
//! A file's share-keys must match its recipient set exactly. `reconcile`
//! seals the file's envelope key for every recipient lacking a share-key and
//! deletes share-keys nobody should hold any more. Bulk variants fold
//! per-file outcomes into a [`BatchReport`] instead of stopping at the first
//! failure.

use std::collections::BTreeSet;
use std::sync::Arc;

use keyshare_crypto::{DerivedKey, KeyCrypto};
use keyshare_storage::{all_files, FileView};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{KeyError, KeyResult};
use crate::interception::Suspension;
use crate::keymanager::KeyManager;
use crate::layout;
use crate::session::Session;
use crate::types::UserId;

/// Changes applied to one file's share-keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub created: Vec<UserId>,
    pub removed: Vec<String>,
    /// Recipients left out because they have no public key yet.
    pub not_ready: Vec<UserId>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty()
    }
}

/// Aggregate outcome of a bulk pass over many files.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    /// Files that vanished mid-pass or carry no keys.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, KeyError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn record_failure(&mut self, path: String, err: KeyError) {
        warn!("{path}: {err}");
        self.failed.push((path, err));
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded.extend(other.succeeded);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }

    /// Collapses the report into `PartialFanoutFailure` if anything failed.
    pub fn into_result(self) -> KeyResult<BatchReport> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(KeyError::PartialFanoutFailure {
                failed: self.failed.len(),
                total: self.total(),
            })
        }
    }
}

/// Outcome of one file in a bulk pass.
pub enum FileOutcome {
    Done,
    Skipped,
}

/// Walks every file at or below `path` in `owner`'s tree and applies `op`
/// to each, isolating failures.
pub fn for_each_file<F>(view: &dyn FileView, owner: &UserId, path: &str, mut op: F) -> BatchReport
where
    F: FnMut(&str) -> KeyResult<FileOutcome>,
{
    let mut report = BatchReport::default();
    let root = layout::user_file_path(owner, path);
    for entry in all_files(view, &root) {
        let full = match entry {
            Ok(full) => full,
            Err(e) => {
                report.record_failure(root.clone(), e.into());
                continue;
            }
        };
        let Some(rel) = layout::strip_user_files_path(owner, &full) else {
            continue;
        };
        let rel = rel.to_string();
        if !view.exists(&full) {
            report.skipped.push(rel);
            continue;
        }
        match op(&rel) {
            Ok(FileOutcome::Done) => report.succeeded.push(rel),
            Ok(FileOutcome::Skipped) => report.skipped.push(rel),
            Err(e) if is_vanished(&e) => report.skipped.push(rel),
            Err(e) => report.record_failure(rel, e),
        }
    }
    report
}

fn is_vanished(err: &KeyError) -> bool {
    matches!(err, KeyError::Storage(e) if e.is_not_found())
}

/// Creates and prunes share-keys.
#[derive(Clone)]
pub struct FanoutEngine {
    keys: KeyManager,
    crypto: Arc<dyn KeyCrypto>,
}

impl FanoutEngine {
    pub fn new(keys: KeyManager, crypto: Arc<dyn KeyCrypto>) -> Self {
        Self { keys, crypto }
    }

    /// Opens `actor`'s share-key for a file with the session's private key.
    pub fn envelope_key(
        &self,
        session: &Session,
        actor: &UserId,
        owner: &UserId,
        path: &str,
    ) -> KeyResult<DerivedKey> {
        let sk = session.private_key(actor)?;
        let sealed = self.keys.share_key(owner, path, actor)?.ok_or_else(|| {
            KeyError::DecryptionFailure(format!("{actor} holds no share-key for {path}"))
        })?;
        let raw = Zeroizing::new(
            self.crypto
                .open(&sealed, sk)
                .map_err(KeyError::decryption("share-key"))?,
        );
        Ok(DerivedKey::from_slice(&raw)?)
    }

    /// Writes share-keys for `recipients` sealed from a known envelope key.
    pub fn seal_for(
        &self,
        envelope: &DerivedKey,
        owner: &UserId,
        path: &str,
        recipients: &[UserId],
        guard: &Suspension,
    ) -> KeyResult<Reconciliation> {
        let mut outcome = Reconciliation::default();
        for recipient in recipients {
            let Some(public) = self.keys.public_key(recipient)? else {
                warn!("{recipient} has no public key, leaving them out of {path}");
                outcome.not_ready.push(recipient.clone());
                continue;
            };
            let sealed = self.crypto.seal(envelope.as_bytes(), &public)?;
            self.keys.set_share_key(owner, path, recipient, &sealed, guard)?;
            outcome.created.push(recipient.clone());
        }
        Ok(outcome)
    }

    /// Makes the share-keys of one file equal `recipients`.
    ///
    /// Idempotent: when nothing is missing or orphaned, nothing is written
    /// and the session's key is not even needed.
    pub fn reconcile(
        &self,
        session: &Session,
        actor: &UserId,
        owner: &UserId,
        path: &str,
        recipients: &[UserId],
        guard: &Suspension,
    ) -> KeyResult<Reconciliation> {
        let existing: BTreeSet<String> =
            self.keys.share_key_recipients(owner, path)?.into_iter().collect();
        let wanted: BTreeSet<&str> = recipients.iter().map(UserId::as_str).collect();

        let missing: Vec<UserId> = recipients
            .iter()
            .filter(|r| !existing.contains(r.as_str()))
            .cloned()
            .collect();

        let mut outcome = if missing.is_empty() {
            Reconciliation::default()
        } else {
            let envelope = self.envelope_key(session, actor, owner, path)?;
            self.seal_for(&envelope, owner, path, &missing, guard)?
        };

        for orphan in existing.iter().filter(|r| !wanted.contains(r.as_str())) {
            if self.keys.delete_share_key(owner, path, orphan, guard)? {
                outcome.removed.push(orphan.clone());
            }
        }

        if !outcome.is_noop() {
            debug!(
                "reconciled {owner}:{path}: +{:?} -{:?}",
                outcome.created, outcome.removed
            );
        }
        Ok(outcome)
    }

    /// Deletes the share-keys of `remove` for one file.
    pub fn prune(
        &self,
        owner: &UserId,
        path: &str,
        remove: &[UserId],
        guard: &Suspension,
    ) -> KeyResult<Vec<UserId>> {
        let mut removed = Vec::new();
        for user in remove {
            if self.keys.delete_share_key(owner, path, user.as_str(), guard)? {
                removed.push(user.clone());
            }
        }
        if !removed.is_empty() {
            debug!("pruned share-keys of {owner}:{path} for {removed:?}");
        }
        Ok(removed)
    }

    /// Reconciles every encrypted file at or below `path`.
    ///
    /// `recipients_for` is asked per file because shares on sub-folders can
    /// widen the set below the root.
    pub fn reconcile_tree<F>(
        &self,
        session: &Session,
        actor: &UserId,
        owner: &UserId,
        path: &str,
        recipients_for: F,
        guard: &Suspension,
    ) -> BatchReport
    where
        F: Fn(&str) -> KeyResult<Vec<UserId>>,
    {
        for_each_file(self.keys.view().as_ref(), owner, path, |file| {
            if !self.keys.has_keyfile(owner, file) {
                return Ok(FileOutcome::Skipped);
            }
            let recipients = recipients_for(file)?;
            self.reconcile(session, actor, owner, file, &recipients, guard)?;
            Ok(FileOutcome::Done)
        })
    }
}

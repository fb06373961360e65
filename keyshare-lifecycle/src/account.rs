//! Per-user account provisioning, unlock and legacy migration.

use chrono::{DateTime, Utc};
use keyshare_crypto::legacy::decrypt_legacy_content;
use keyshare_crypto::{is_encrypted_content, is_legacy_content, plaintext_len, SecretKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{KeyError, KeyResult};
use crate::fanout::{for_each_file, BatchReport, FileOutcome};
use crate::hooks::KeyLifecycle;
use crate::layout;
use crate::session::Session;
use crate::types::UserId;

/// Persisted per-user flags.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountRecord {
    /// Set once, when legacy files have been converted.
    pub migration_completed: bool,
    pub migrated_at: Option<DateTime<Utc>>,
    /// The user opted into the recovery escrow.
    pub recovery_enabled: bool,
}

/// Where an account stands, as seen from one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountState {
    Unregistered,
    Provisioned,
    Unlocked,
    Locked,
}

impl KeyLifecycle {
    /// Whether both halves of the user's key-pair exist.
    pub fn is_ready(&self, uid: &UserId) -> bool {
        self.keys.has_public_key(uid) && self.keys.has_private_key(uid)
    }

    pub fn account_state(&self, uid: &UserId, session: &Session) -> AccountState {
        if session.is_unlocked_for(uid) {
            AccountState::Unlocked
        } else if !self.keys.has_public_key(uid) && !self.keys.has_private_key(uid) {
            AccountState::Unregistered
        } else if session.is_locked_for(uid) {
            AccountState::Locked
        } else {
            AccountState::Provisioned
        }
    }

    /// Provisions the user's key-pair if missing. Returns whether keys were
    /// created.
    ///
    /// A half-present key-pair is a setup failure: regenerating would
    /// orphan every share-key sealed to the old public key.
    pub(crate) fn setup_server_side(&self, uid: &UserId, passphrase: &str) -> KeyResult<bool> {
        match (self.keys.has_public_key(uid), self.keys.has_private_key(uid)) {
            (true, true) => Ok(false),
            (false, false) => {
                let pair = self.crypto.generate_keypair();
                let wrapped = self
                    .crypto
                    .encrypt_private_key(&pair.secret, passphrase)
                    .map_err(|e| KeyError::setup(uid, e.to_string()))?;
                let guard = self.interception.suspend();
                self.keys.set_private_key(uid, &wrapped, &guard)?;
                self.keys.set_public_key(uid, &pair.public, &guard)?;
                info!("provisioned key-pair for {uid}");
                Ok(true)
            }
            _ => Err(KeyError::setup(uid, "only one half of the key-pair exists")),
        }
    }

    pub(crate) fn unlock(&self, uid: &UserId, passphrase: &str) -> KeyResult<SecretKey> {
        let wrapped = self
            .keys
            .private_key(uid)?
            .ok_or_else(|| KeyError::setup(uid, "private key missing"))?;
        self.crypto
            .decrypt_private_key(&wrapped, passphrase)
            .map_err(KeyError::decryption("private key"))
    }

    pub fn migration_completed(&self, uid: &UserId) -> KeyResult<bool> {
        Ok(self.keys.account_record(uid)?.migration_completed)
    }

    /// Sets the migration flag. Returns `false` if it was already set.
    pub(crate) fn complete_migration(&self, uid: &UserId) -> KeyResult<bool> {
        let mut record = self.keys.account_record(uid)?;
        if record.migration_completed {
            return Ok(false);
        }
        record.migration_completed = true;
        record.migrated_at = Some(Utc::now());
        let guard = self.interception.suspend();
        self.keys.set_account_record(uid, &record, &guard)?;
        info!("migration completed for {uid}");
        Ok(true)
    }

    /// Encrypts every plaintext or legacy file of `uid` under the current
    /// scheme. Files already in the current container are skipped.
    pub fn encrypt_all(&self, session: &Session, uid: &UserId) -> BatchReport {
        let view = self.keys.view().clone();
        for_each_file(view.as_ref(), uid, "/", |path| {
            let data = view.read(&layout::user_file_path(uid, path))?;
            if is_encrypted_content(&data) {
                return Ok(FileOutcome::Skipped);
            }
            let plaintext = if is_legacy_content(&data) {
                let key = session.legacy_key().ok_or_else(|| {
                    KeyError::DecryptionFailure(format!("{path} needs the legacy key"))
                })?;
                decrypt_legacy_content(key, &data).map_err(KeyError::decryption("legacy file"))?
            } else {
                data
            };
            self.encrypt_owned_file(uid, path, &plaintext)?;
            Ok(FileOutcome::Done)
        })
    }

    /// Records the plaintext size of an encrypted file in the catalog.
    pub fn fix_file_size(&self, owner: &UserId, path: &str) -> KeyResult<Option<u64>> {
        let Some(data) = self
            .keys
            .view()
            .read_optional(&layout::user_file_path(owner, path))?
        else {
            return Ok(None);
        };
        if !is_encrypted_content(&data) {
            return Ok(None);
        }
        let size = plaintext_len(&data)?;
        self.catalog.record_unencrypted_size(owner, path, size)?;
        Ok(Some(size))
    }
}

//! Recovery escrow: an administrator-held key-pair that lets a password
//! reset keep a user's files readable.
//!
//! The recovery private key is wrapped under the recovery passphrase. A
//! fixed sentinel sealed to the recovery public key serves as a verifier,
//! so the passphrase can be checked without touching any user data.

use std::sync::Arc;

use keyshare_crypto::{KeyCrypto, PublicKey, SecretKey};
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::directory::{SettingsStore, RECOVERY_ADMIN_ENABLED_SETTING, RECOVERY_KEY_ID_SETTING};
use crate::error::{KeyError, KeyResult};
use crate::fanout::{for_each_file, BatchReport, FileOutcome};
use crate::interception::{Interception, Suspension};
use crate::keymanager::KeyManager;
use crate::types::UserId;

const CONTROL_SENTINEL: &[u8] = b"keyshare-recovery-control";

#[derive(Clone)]
pub struct RecoveryManager {
    keys: KeyManager,
    crypto: Arc<dyn KeyCrypto>,
    settings: Arc<dyn SettingsStore>,
    interception: Interception,
    preferred_id: Option<String>,
}

impl RecoveryManager {
    pub fn new(
        keys: KeyManager,
        crypto: Arc<dyn KeyCrypto>,
        settings: Arc<dyn SettingsStore>,
        interception: Interception,
        preferred_id: Option<String>,
    ) -> Self {
        Self {
            keys,
            crypto,
            settings,
            interception,
            preferred_id,
        }
    }

    /// The recorded recovery key id, if any.
    pub fn key_id(&self) -> KeyResult<Option<UserId>> {
        self.settings
            .get(RECOVERY_KEY_ID_SETTING)?
            .map(UserId::new)
            .transpose()
    }

    fn key_id_or_assign(&self) -> KeyResult<UserId> {
        if let Some(id) = self.key_id()? {
            return Ok(id);
        }
        let id = match &self.preferred_id {
            Some(id) => UserId::new(id.as_str())?,
            None => {
                let suffix = Uuid::new_v4().simple().to_string();
                UserId::new(format!("recovery_{}", &suffix[..8]))?
            }
        };
        self.settings.set(RECOVERY_KEY_ID_SETTING, id.as_str())?;
        Ok(id)
    }

    /// Whether the administrator switched the escrow on.
    pub fn is_enabled(&self) -> KeyResult<bool> {
        Ok(self.settings.get(RECOVERY_ADMIN_ENABLED_SETTING)?.as_deref() == Some("1"))
    }

    /// Switches the escrow on, creating the key-pair on first use.
    ///
    /// Existing escrow material is never replaced: if it exists,
    /// `passphrase` must unlock it.
    pub fn enable(&self, passphrase: &str) -> KeyResult<UserId> {
        let id = self.key_id_or_assign()?;
        let has_public = self.keys.has_public_key(&id);
        let has_private = self.keys.system_private_key(&id)?.is_some();

        match (has_public, has_private) {
            (true, true) => self.check_password(passphrase)?,
            (false, false) => {
                let pair = self.crypto.generate_keypair();
                let wrapped = self.crypto.encrypt_private_key(&pair.secret, passphrase)?;
                let control = self.crypto.seal(CONTROL_SENTINEL, &pair.public)?;
                let guard = self.interception.suspend();
                self.keys.set_system_private_key(&id, &wrapped, &guard)?;
                self.keys.set_control_file(&control, &guard)?;
                self.keys.set_public_key(&id, &pair.public, &guard)?;
                info!("created recovery key-pair {id}");
            }
            _ => return Err(KeyError::setup(&id, "incomplete recovery key-pair")),
        }

        self.settings.set(RECOVERY_ADMIN_ENABLED_SETTING, "1")?;
        info!("recovery escrow enabled");
        Ok(id)
    }

    /// Switches the escrow off. Key material is kept.
    pub fn disable(&self, passphrase: &str) -> KeyResult<()> {
        self.check_password(passphrase)?;
        self.settings.set(RECOVERY_ADMIN_ENABLED_SETTING, "0")?;
        info!("recovery escrow disabled");
        Ok(())
    }

    /// Verifies the recovery passphrase against the stored verifier.
    pub fn check_password(&self, passphrase: &str) -> KeyResult<()> {
        self.unlock(passphrase).map(|_| ())
    }

    fn unlock(&self, passphrase: &str) -> KeyResult<(UserId, SecretKey)> {
        let id = self.key_id()?.ok_or(KeyError::RecoveryNotConfigured)?;
        let wrapped = self
            .keys
            .system_private_key(&id)?
            .ok_or(KeyError::RecoveryNotConfigured)?;
        let control = self
            .keys
            .control_file()?
            .ok_or(KeyError::RecoveryNotConfigured)?;

        let sk = self
            .crypto
            .decrypt_private_key(&wrapped, passphrase)
            .map_err(|_| KeyError::RecoveryVerificationFailure)?;
        let opened = self
            .crypto
            .open(&control, &sk)
            .map_err(|_| KeyError::RecoveryVerificationFailure)?;
        if opened != CONTROL_SENTINEL {
            return Err(KeyError::RecoveryVerificationFailure);
        }
        Ok((id, sk))
    }

    /// Re-seals every escrowed file of `uid` for `new_public`.
    ///
    /// Opens the recovery share-key of each file and writes the result as
    /// the user's own share-key. Files that were never escrowed are skipped.
    pub fn recover_user_files(
        &self,
        uid: &UserId,
        passphrase: &str,
        new_public: &PublicKey,
        guard: &Suspension,
    ) -> KeyResult<BatchReport> {
        let (id, sk) = self.unlock(passphrase)?;
        let view = self.keys.view().clone();
        let report = for_each_file(view.as_ref(), uid, "/", |path| {
            if !self.keys.has_keyfile(uid, path) {
                return Ok(FileOutcome::Skipped);
            }
            let Some(sealed) = self.keys.share_key(uid, path, &id)? else {
                warn!("{uid}:{path} was never escrowed and stays unreadable");
                return Ok(FileOutcome::Skipped);
            };
            let envelope = Zeroizing::new(
                self.crypto
                    .open(&sealed, &sk)
                    .map_err(KeyError::decryption("recovery share-key"))?,
            );
            let resealed = self.crypto.seal(&envelope, new_public)?;
            self.keys.set_share_key(uid, path, uid, &resealed, guard)?;
            Ok(FileOutcome::Done)
        });
        info!(
            "recovered {} files of {uid} ({} skipped, {} failed)",
            report.succeeded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

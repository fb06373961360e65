//! The lifecycle orchestrator.
//!
//! [`KeyLifecycle`] owns every component and implements one handler per
//! lifecycle event. Handlers that need key material take the request's
//! [`Session`] explicitly; nothing is cached between requests.
//!
//! Login and account creation are fail-closed: any failure aborts the
//! triggering action. Sharing handlers report per-file failures through a
//! [`BatchReport`] and only fail as a whole once every file was attempted.

use std::sync::Arc;

use keyshare_crypto::{KeyCrypto, StandardCrypto};
use keyshare_storage::FileView;
use tracing::{debug, error, info, warn};

use crate::config::EncryptionConfig;
use crate::directory::{FileCatalog, GroupDirectory, SettingsStore, ShareRegistry};
use crate::error::{KeyError, KeyResult};
use crate::events::{ShareEvent, ShareRequest, UnshareEvent};
use crate::fanout::{for_each_file, BatchReport, FanoutEngine, FileOutcome};
use crate::interception::Interception;
use crate::keymanager::KeyManager;
use crate::layout;
use crate::recipients::RecipientSetCalculator;
use crate::recovery::RecoveryManager;
use crate::resolver::PathResolver;
use crate::session::Session;
use crate::types::UserId;

/// Host services the orchestrator is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub view: Arc<dyn FileView>,
    pub catalog: Arc<dyn FileCatalog>,
    pub shares: Arc<dyn ShareRegistry>,
    pub groups: Arc<dyn GroupDirectory>,
    pub settings: Arc<dyn SettingsStore>,
}

/// What a successful login did besides unlocking the session.
#[derive(Debug, Default)]
pub struct LoginOutcome {
    /// A key-pair was provisioned during this login.
    pub created: bool,
    /// The one-time migration finished during this login.
    pub migrated: bool,
    /// Result of the bulk-encryption pass, if one ran.
    pub report: Option<BatchReport>,
}

/// How a passphrase change was carried out.
#[derive(Debug)]
pub enum PasswordChange {
    /// Self-service: the existing private key was re-wrapped.
    Rewrapped,
    /// Administrator reset: a new key-pair replaced the old one.
    Reset { recovered: Option<BatchReport> },
}

/// Key lifecycle orchestration for one installation.
pub struct KeyLifecycle {
    pub(crate) config: EncryptionConfig,
    pub(crate) keys: KeyManager,
    pub(crate) crypto: Arc<dyn KeyCrypto>,
    pub(crate) catalog: Arc<dyn FileCatalog>,
    pub(crate) interception: Interception,
    pub(crate) resolver: PathResolver,
    pub(crate) recipients: RecipientSetCalculator,
    pub(crate) fanout: FanoutEngine,
    pub(crate) recovery: RecoveryManager,
}

impl KeyLifecycle {
    /// Builds the orchestrator with the standard cipher suite, wrapping
    /// private keys with the configured KDF parameters.
    pub fn new(collaborators: Collaborators, config: EncryptionConfig) -> KeyResult<Self> {
        let crypto = Arc::new(StandardCrypto::new(config.kdf.clone()));
        Self::with_crypto(collaborators, config, crypto)
    }

    pub fn with_crypto(
        collaborators: Collaborators,
        config: EncryptionConfig,
        crypto: Arc<dyn KeyCrypto>,
    ) -> KeyResult<Self> {
        config.validate()?;
        let Collaborators {
            view,
            catalog,
            shares,
            groups,
            settings,
        } = collaborators;

        let keys = KeyManager::new(view);
        let interception = Interception::new();
        let resolver = PathResolver::new(catalog.clone(), shares.clone());
        let recipients = RecipientSetCalculator::new(shares, groups, config.public_share_user()?);
        let fanout = FanoutEngine::new(keys.clone(), crypto.clone());
        let recovery = RecoveryManager::new(
            keys.clone(),
            crypto.clone(),
            settings,
            interception.clone(),
            config.recovery_key_id.clone(),
        );

        Ok(Self {
            config,
            keys,
            crypto,
            catalog,
            interception,
            resolver,
            recipients,
            fanout,
            recovery,
        })
    }

    pub fn config(&self) -> &EncryptionConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    pub fn interception(&self) -> &Interception {
        &self.interception
    }

    pub fn recovery(&self) -> &RecoveryManager {
        &self.recovery
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn recipients(&self) -> &RecipientSetCalculator {
        &self.recipients
    }

    /// Current recipients of `path` in `owner`'s tree.
    pub(crate) fn recipients_for(&self, owner: &UserId, path: &str) -> KeyResult<Vec<UserId>> {
        let recovery = self.recovery_recipient(owner)?;
        self.recipients
            .recipients(owner, path, self.config.sharing_enabled, recovery.as_ref())
    }

    /// The recovery key id, when the escrow covers `owner`.
    pub(crate) fn recovery_recipient(&self, owner: &UserId) -> KeyResult<Option<UserId>> {
        if !self.recovery.is_enabled()? || !self.keys.account_record(owner)?.recovery_enabled {
            return Ok(None);
        }
        self.recovery.key_id()
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Unlocks `uid`'s private key into `session`, provisioning keys and
    /// running the one-time migration as needed.
    ///
    /// On any failure the session is left locked.
    pub fn login(
        &self,
        session: &mut Session,
        uid: &UserId,
        passphrase: &str,
    ) -> KeyResult<LoginOutcome> {
        match self.try_login(session, uid, passphrase) {
            Ok(outcome) => {
                info!("{uid} logged in");
                Ok(outcome)
            }
            Err(e) => {
                session.lock();
                error!("login of {uid} aborted: {e}");
                Err(e)
            }
        }
    }

    fn try_login(
        &self,
        session: &mut Session,
        uid: &UserId,
        passphrase: &str,
    ) -> KeyResult<LoginOutcome> {
        let created = self.setup_server_side(uid, passphrase)?;
        let sk = self.unlock(uid, passphrase)?;
        session.unlock(uid.clone(), sk);

        if self.migration_completed(uid)? {
            return Ok(LoginOutcome {
                created,
                ..LoginOutcome::default()
            });
        }

        if let Some(blob) = self.keys.legacy_key(uid)? {
            let key = self
                .crypto
                .decrypt_legacy_key(&blob, passphrase)
                .map_err(|e| KeyError::setup(uid, format!("legacy key: {e}")))?;
            session.set_legacy_key(key);
        }

        let report = self.encrypt_all(session, uid);
        let migrated = if report.is_clean() {
            self.complete_migration(uid)?
        } else {
            warn!(
                "migration of {uid} incomplete, {} of {} files failed; retrying at next login",
                report.failed.len(),
                report.total()
            );
            false
        };
        Ok(LoginOutcome {
            created,
            migrated,
            report: Some(report),
        })
    }

    /// Changes `uid`'s passphrase.
    ///
    /// The mode follows who is acting. When `session` belongs to `uid` the
    /// user is changing their own passphrase and the private key is
    /// re-wrapped; a locked session fails with [`KeyError::Locked`] and
    /// writes nothing. Any other session (another user's, or none at all
    /// for admin tooling) performs an administrator reset: a new key-pair
    /// replaces the old one and, given the recovery passphrase and the
    /// user's opt-in, escrowed files are re-sealed for it. A rejected
    /// recovery passphrase aborts before anything is written.
    pub fn set_passphrase(
        &self,
        session: &Session,
        uid: &UserId,
        new_passphrase: &str,
        recovery_passphrase: Option<&str>,
    ) -> KeyResult<PasswordChange> {
        if session.user() == Some(uid) {
            let wrapped = self
                .crypto
                .encrypt_private_key(session.private_key(uid)?, new_passphrase)?;
            let guard = self.interception.suspend();
            self.keys.set_private_key(uid, &wrapped, &guard)?;
            info!("re-wrapped private key of {uid}");
            return Ok(PasswordChange::Rewrapped);
        }

        let recovery = match recovery_passphrase {
            Some(pw) => {
                self.recovery.check_password(pw)?;
                if self.recovery_recipient(uid)?.is_some() {
                    Some(pw)
                } else {
                    warn!("{uid} has not opted into recovery; files stay unreadable");
                    None
                }
            }
            None => None,
        };

        let pair = self.crypto.generate_keypair();
        let wrapped = self.crypto.encrypt_private_key(&pair.secret, new_passphrase)?;
        let guard = self.interception.suspend();
        self.keys.set_private_key(uid, &wrapped, &guard)?;
        self.keys.set_public_key(uid, &pair.public, &guard)?;
        info!("reset key-pair of {uid}");

        let recovered = match recovery {
            Some(pw) => Some(self.recovery.recover_user_files(uid, pw, &pair.public, &guard)?),
            None => None,
        };
        Ok(PasswordChange::Reset { recovered })
    }

    /// Provisions key material for a new account. A fresh account has no
    /// legacy files, so the migration is marked done right away.
    pub fn post_create_user(&self, uid: &UserId, passphrase: &str) -> KeyResult<bool> {
        let created = self.setup_server_side(uid, passphrase)?;
        if created {
            self.complete_migration(uid)?;
        }
        Ok(created)
    }

    /// Deletes the public key of a removed account so nobody seals new
    /// share-keys for it.
    pub fn post_delete_user(&self, uid: &UserId) -> KeyResult<bool> {
        let guard = self.interception.suspend();
        let deleted = self.keys.delete_public_key(uid, &guard)?;
        if deleted {
            info!("deleted public key of {uid}");
        }
        Ok(deleted)
    }

    /// Creates the link-share key-pair if missing. Its private key is
    /// wrapped with an empty passphrase.
    pub fn bootstrap(&self) -> KeyResult<bool> {
        let id = self.config.public_share_user()?;
        let has_public = self.keys.has_public_key(&id);
        let has_private = self.keys.system_private_key(&id)?.is_some();
        match (has_public, has_private) {
            (true, true) => Ok(false),
            (false, false) => {
                let pair = self.crypto.generate_keypair();
                let wrapped = self.crypto.encrypt_private_key(&pair.secret, "")?;
                let guard = self.interception.suspend();
                self.keys.set_system_private_key(&id, &wrapped, &guard)?;
                self.keys.set_public_key(&id, &pair.public, &guard)?;
                info!("created link-share key-pair {id}");
                Ok(true)
            }
            _ => Err(KeyError::setup(&id, "incomplete link-share key-pair")),
        }
    }

    // ------------------------------------------------------------------
    // Sharing
    // ------------------------------------------------------------------

    /// Vetoes a share whose recipients cannot receive share-keys yet.
    pub fn pre_share(&self, request: &ShareRequest) -> KeyResult<()> {
        if !self.config.sharing_enabled {
            return Ok(());
        }
        for user in self.recipients.expand_grant(&request.grant)? {
            if !self.keys.has_public_key(&user) {
                warn!("refusing share by {}: {user} has no keys", request.uid_owner);
                return Err(KeyError::MissingPublicKey(user));
            }
        }
        Ok(())
    }

    /// Seals the shared item's keys for its new recipients.
    pub fn post_share(&self, session: &Session, event: &ShareEvent) -> KeyResult<BatchReport> {
        if !self.config.sharing_enabled {
            debug!("sharing disabled, ignoring share {}", event.id);
            return Ok(BatchReport::default());
        }
        let target = self.resolver.resolve_share(event)?;
        let guard = self.interception.suspend();
        let report = self.fanout.reconcile_tree(
            session,
            &event.uid_owner,
            &target.owner,
            &target.path,
            |file| self.recipients_for(&target.owner, file),
            &guard,
        );
        info!(
            "share {} of {}:{} reconciled {} files",
            event.id,
            target.owner,
            target.path,
            report.succeeded.len()
        );
        report.into_result()
    }

    /// Deletes share-keys of users the removed share reached, unless some
    /// other share still reaches them.
    pub fn post_unshare(&self, event: &UnshareEvent) -> KeyResult<BatchReport> {
        let target = self.resolver.resolve_unshare(event)?;
        let candidates = self.recipients.expand_grant(&event.grant)?;
        let recovery = self.recovery_recipient(&target.owner)?;
        let guard = self.interception.suspend();
        let view = self.keys.view().clone();

        let report = for_each_file(view.as_ref(), &target.owner, &target.path, |file| {
            if !self.keys.has_keyfile(&target.owner, file) {
                return Ok(FileOutcome::Skipped);
            }
            let current =
                self.recipients
                    .recipients(&target.owner, file, true, recovery.as_ref())?;
            let remove: Vec<UserId> = candidates
                .iter()
                .filter(|c| !current.contains(c))
                .cloned()
                .collect();
            self.fanout.prune(&target.owner, file, &remove, &guard)?;
            Ok(FileOutcome::Done)
        });
        info!(
            "unshare of {}:{} pruned {} files",
            target.owner,
            target.path,
            report.succeeded.len()
        );
        report.into_result()
    }

    // ------------------------------------------------------------------
    // File moves and recovery opt-in
    // ------------------------------------------------------------------

    /// Moves key material after `actor` renamed `old` to `new`, then
    /// refreshes sizes and share-keys for the new location.
    pub fn post_rename(
        &self,
        session: &Session,
        actor: &UserId,
        old: &str,
        new: &str,
    ) -> KeyResult<BatchReport> {
        let from = self.resolver.resolve_view(actor, old)?;
        let to = self.resolver.resolve_view(actor, new)?;
        let view = self.keys.view().clone();
        let is_dir = view.is_dir(&layout::user_file_path(&to.owner, &to.path));

        let guard = self.interception.suspend();
        self.keys
            .relocate(&from.owner, &from.path, &to.owner, &to.path, is_dir, &guard)?;
        debug!("moved keys {}:{} -> {}:{}", from.owner, from.path, to.owner, to.path);

        let report = for_each_file(view.as_ref(), &to.owner, &to.path, |file| {
            if !self.keys.has_keyfile(&to.owner, file) {
                return Ok(FileOutcome::Skipped);
            }
            self.fix_file_size(&to.owner, file)?;
            let recipients = self.recipients_for(&to.owner, file)?;
            self.fanout
                .reconcile(session, actor, &to.owner, file, &recipients, &guard)?;
            Ok(FileOutcome::Done)
        });
        report.into_result()
    }

    /// Opts `uid` in or out of the recovery escrow and brings the recovery
    /// share-keys of all their files in line.
    pub fn set_user_recovery(
        &self,
        session: &Session,
        uid: &UserId,
        enabled: bool,
    ) -> KeyResult<BatchReport> {
        if enabled && !self.recovery.is_enabled()? {
            return Err(KeyError::RecoveryNotConfigured);
        }
        let mut record = self.keys.account_record(uid)?;
        record.recovery_enabled = enabled;

        let guard = self.interception.suspend();
        self.keys.set_account_record(uid, &record, &guard)?;
        info!("recovery {} for {uid}", if enabled { "enabled" } else { "disabled" });

        self.fanout
            .reconcile_tree(
                session,
                uid,
                uid,
                "/",
                |file| self.recipients_for(uid, file),
                &guard,
            )
            .into_result()
    }
}

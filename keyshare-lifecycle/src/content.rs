//! Reading and writing encrypted file content.

use keyshare_crypto::legacy::decrypt_legacy_content;
use keyshare_crypto::{
    decrypt_content, encrypt_content, generate_random_key, is_encrypted_content,
    is_legacy_content, DerivedKey,
};
use keyshare_storage::path::dirname;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{KeyError, KeyResult};
use crate::fanout::Reconciliation;
use crate::hooks::KeyLifecycle;
use crate::layout;
use crate::session::Session;
use crate::types::UserId;

impl KeyLifecycle {
    /// Encrypts `plaintext` to `path` in `actor`'s view with fresh keys and
    /// seals them for every current recipient.
    pub fn encrypt_file(
        &self,
        actor: &UserId,
        path: &str,
        plaintext: &[u8],
    ) -> KeyResult<Reconciliation> {
        let target = self.resolver.resolve_view(actor, path)?;
        self.encrypt_owned_file(&target.owner, &target.path, plaintext)
    }

    pub(crate) fn encrypt_owned_file(
        &self,
        owner: &UserId,
        path: &str,
        plaintext: &[u8],
    ) -> KeyResult<Reconciliation> {
        if !self.keys.has_public_key(owner) {
            return Err(KeyError::MissingPublicKey(owner.clone()));
        }
        let content_key = generate_random_key();
        let envelope = generate_random_key();
        let keyfile = self.crypto.wrap(&envelope, content_key.as_bytes())?;
        let body = encrypt_content(&content_key, plaintext)?;
        let recipients = self.recipients_for(owner, path)?;

        let guard = self.interception.suspend();
        let file = layout::user_file_path(owner, path);
        let view = self.keys.view();
        view.mkdir_all(dirname(&file))?;
        view.write(&file, &body)?;
        self.keys.set_keyfile(owner, path, &keyfile, &guard)?;

        // Share-keys of a previous version wrap a different envelope key.
        for stale in self.keys.share_key_recipients(owner, path)? {
            self.keys.delete_share_key(owner, path, &stale, &guard)?;
        }
        let outcome = self
            .fanout
            .seal_for(&envelope, owner, path, &recipients, &guard)?;
        self.catalog
            .record_unencrypted_size(owner, path, plaintext.len() as u64)?;
        debug!("encrypted {owner}:{path} for {} recipients", outcome.created.len());
        Ok(outcome)
    }

    /// Reads a file from `actor`'s view, decrypting as needed.
    pub fn read_file(&self, session: &Session, actor: &UserId, path: &str) -> KeyResult<Vec<u8>> {
        let target = self.resolver.resolve_view(actor, path)?;
        let data = self
            .keys
            .view()
            .read(&layout::user_file_path(&target.owner, &target.path))?;

        if is_encrypted_content(&data) {
            let key = self.owned_content_key(session, actor, &target.owner, &target.path)?;
            decrypt_content(&key, &data).map_err(KeyError::decryption("file content"))
        } else if is_legacy_content(&data) {
            let key = session.legacy_key().ok_or_else(|| {
                KeyError::DecryptionFailure(format!("{path} needs the legacy key"))
            })?;
            decrypt_legacy_content(key, &data).map_err(KeyError::decryption("legacy file"))
        } else {
            Ok(data)
        }
    }

    /// The content key of a file in `actor`'s view.
    pub fn content_key(
        &self,
        session: &Session,
        actor: &UserId,
        path: &str,
    ) -> KeyResult<DerivedKey> {
        let target = self.resolver.resolve_view(actor, path)?;
        self.owned_content_key(session, actor, &target.owner, &target.path)
    }

    fn owned_content_key(
        &self,
        session: &Session,
        actor: &UserId,
        owner: &UserId,
        path: &str,
    ) -> KeyResult<DerivedKey> {
        let envelope = self.fanout.envelope_key(session, actor, owner, path)?;
        let keyfile = self
            .keys
            .keyfile(owner, path)?
            .ok_or_else(|| KeyError::DecryptionFailure(format!("no keyfile for {path}")))?;
        let raw = Zeroizing::new(
            self.crypto
                .unwrap(&envelope, &keyfile)
                .map_err(KeyError::decryption("keyfile"))?,
        );
        Ok(DerivedKey::from_slice(&raw)?)
    }
}

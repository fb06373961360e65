//! Durable storage of key artifacts on top of a [`FileView`].
//!
//! Reads are free. Every write takes a [`Suspension`] so it can only happen
//! while lifecycle event dispatch is suspended.

use std::sync::Arc;

use keyshare_crypto::{decode_public_key, encode_public_key, PublicKey};
use keyshare_storage::path::{basename, dirname};
use keyshare_storage::FileView;
use tracing::debug;

use crate::account::AccountRecord;
use crate::error::KeyResult;
use crate::interception::Suspension;
use crate::layout;
use crate::types::UserId;

/// Reads and writes keys, keyfiles and share-keys in the fixed layout.
#[derive(Clone)]
pub struct KeyManager {
    view: Arc<dyn FileView>,
}

impl KeyManager {
    pub fn new(view: Arc<dyn FileView>) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &Arc<dyn FileView> {
        &self.view
    }

    fn put(&self, path: &str, data: &[u8]) -> KeyResult<()> {
        self.view.mkdir_all(dirname(path))?;
        self.view.write(path, data)?;
        Ok(())
    }

    fn get(&self, path: &str) -> KeyResult<Option<Vec<u8>>> {
        Ok(self.view.read_optional(path)?)
    }

    // ------------------------------------------------------------------
    // Key pairs
    // ------------------------------------------------------------------

    pub fn has_public_key(&self, id: &UserId) -> bool {
        self.view.exists(&layout::public_key_path(id))
    }

    pub fn public_key(&self, id: &UserId) -> KeyResult<Option<PublicKey>> {
        match self.get(&layout::public_key_path(id))? {
            Some(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                Ok(Some(decode_public_key(&text)?))
            }
            None => Ok(None),
        }
    }

    pub fn set_public_key(&self, id: &UserId, key: &PublicKey, _: &Suspension) -> KeyResult<()> {
        self.put(&layout::public_key_path(id), encode_public_key(key).as_bytes())
    }

    pub fn delete_public_key(&self, id: &UserId, _: &Suspension) -> KeyResult<bool> {
        Ok(self.view.unlink_if_exists(&layout::public_key_path(id))?)
    }

    pub fn has_private_key(&self, uid: &UserId) -> bool {
        self.view.exists(&layout::private_key_path(uid))
    }

    pub fn private_key(&self, uid: &UserId) -> KeyResult<Option<Vec<u8>>> {
        self.get(&layout::private_key_path(uid))
    }

    pub fn set_private_key(&self, uid: &UserId, wrapped: &[u8], _: &Suspension) -> KeyResult<()> {
        self.put(&layout::private_key_path(uid), wrapped)
    }

    /// Private key of a system key-pair (recovery, public link).
    pub fn system_private_key(&self, id: &UserId) -> KeyResult<Option<Vec<u8>>> {
        self.get(&layout::system_private_key_path(id))
    }

    pub fn set_system_private_key(
        &self,
        id: &UserId,
        wrapped: &[u8],
        _: &Suspension,
    ) -> KeyResult<()> {
        self.put(&layout::system_private_key_path(id), wrapped)
    }

    pub fn control_file(&self) -> KeyResult<Option<Vec<u8>>> {
        self.get(layout::CONTROL_FILE)
    }

    pub fn set_control_file(&self, data: &[u8], _: &Suspension) -> KeyResult<()> {
        self.put(layout::CONTROL_FILE, data)
    }

    pub fn legacy_key(&self, uid: &UserId) -> KeyResult<Option<Vec<u8>>> {
        self.get(&layout::legacy_key_path(uid))
    }

    // ------------------------------------------------------------------
    // Account record
    // ------------------------------------------------------------------

    pub fn account_record(&self, uid: &UserId) -> KeyResult<AccountRecord> {
        match self.get(&layout::account_record_path(uid))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(AccountRecord::default()),
        }
    }

    pub fn set_account_record(
        &self,
        uid: &UserId,
        record: &AccountRecord,
        _: &Suspension,
    ) -> KeyResult<()> {
        self.put(&layout::account_record_path(uid), &serde_json::to_vec(record)?)
    }

    // ------------------------------------------------------------------
    // Keyfiles and share-keys
    // ------------------------------------------------------------------

    pub fn keyfile(&self, owner: &UserId, path: &str) -> KeyResult<Option<Vec<u8>>> {
        self.get(&layout::keyfile_path(owner, path))
    }

    pub fn has_keyfile(&self, owner: &UserId, path: &str) -> bool {
        self.view.exists(&layout::keyfile_path(owner, path))
    }

    pub fn set_keyfile(
        &self,
        owner: &UserId,
        path: &str,
        data: &[u8],
        _: &Suspension,
    ) -> KeyResult<()> {
        self.put(&layout::keyfile_path(owner, path), data)
    }

    pub fn share_key(
        &self,
        owner: &UserId,
        path: &str,
        recipient: &UserId,
    ) -> KeyResult<Option<Vec<u8>>> {
        self.get(&layout::share_key_path(owner, path, recipient.as_str()))
    }

    pub fn set_share_key(
        &self,
        owner: &UserId,
        path: &str,
        recipient: &UserId,
        data: &[u8],
        _: &Suspension,
    ) -> KeyResult<()> {
        self.put(&layout::share_key_path(owner, path, recipient.as_str()), data)
    }

    pub fn delete_share_key(
        &self,
        owner: &UserId,
        path: &str,
        recipient: &str,
        _: &Suspension,
    ) -> KeyResult<bool> {
        let target = layout::share_key_path(owner, path, recipient);
        Ok(self.view.unlink_if_exists(&target)?)
    }

    /// Recipients currently holding a share-key for the file at `path`.
    pub fn share_key_recipients(&self, owner: &UserId, path: &str) -> KeyResult<Vec<String>> {
        let dir = layout::share_keys_dir_for_file(owner, path);
        if !self.view.is_dir(&dir) {
            return Ok(Vec::new());
        }
        let name = basename(path);
        let mut recipients: Vec<String> = self
            .view
            .list_dir(&dir)?
            .into_iter()
            .filter(|e| !e.is_dir)
            .filter_map(|e| layout::parse_share_key_name(name, &e.name).map(str::to_string))
            .collect();
        recipients.sort();
        Ok(recipients)
    }

    /// Moves the keyfile and every share-key of `old` to mirror `new`.
    ///
    /// Folders move as whole directory trees. Missing keys are not an
    /// error: plaintext files have none.
    pub fn relocate(
        &self,
        old_owner: &UserId,
        old: &str,
        new_owner: &UserId,
        new: &str,
        is_dir: bool,
        _: &Suspension,
    ) -> KeyResult<()> {
        if is_dir {
            for (from, to) in [
                (
                    layout::keyfile_dir(old_owner, old),
                    layout::keyfile_dir(new_owner, new),
                ),
                (
                    layout::share_key_dir(old_owner, old),
                    layout::share_key_dir(new_owner, new),
                ),
            ] {
                self.move_entry(&from, &to)?;
            }
            return Ok(());
        }

        self.move_entry(
            &layout::keyfile_path(old_owner, old),
            &layout::keyfile_path(new_owner, new),
        )?;
        for recipient in self.share_key_recipients(old_owner, old)? {
            self.move_entry(
                &layout::share_key_path(old_owner, old, &recipient),
                &layout::share_key_path(new_owner, new, &recipient),
            )?;
        }
        Ok(())
    }

    fn move_entry(&self, from: &str, to: &str) -> KeyResult<()> {
        if !self.view.exists(from) {
            return Ok(());
        }
        self.view.mkdir_all(dirname(to))?;
        self.view.rename(from, to)?;
        debug!("moved key artifact {from} -> {to}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::Interception;
    use keyshare_storage::MemoryView;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn share_key_listing_is_per_file() {
        let keys = KeyManager::new(Arc::new(MemoryView::new()));
        let guard = Interception::new().suspend();
        let alice = uid("alice");
        keys.set_share_key(&alice, "/d/a.txt", &uid("bob"), b"1", &guard).unwrap();
        keys.set_share_key(&alice, "/d/a.txt", &alice, b"2", &guard).unwrap();
        keys.set_share_key(&alice, "/d/a.txt.bak", &uid("carol"), b"3", &guard).unwrap();

        assert_eq!(
            keys.share_key_recipients(&alice, "/d/a.txt").unwrap(),
            vec!["alice", "bob"]
        );
        assert_eq!(
            keys.share_key_recipients(&alice, "/d/a.txt.bak").unwrap(),
            vec!["carol"]
        );
        assert!(keys.share_key_recipients(&alice, "/none/x").unwrap().is_empty());
    }

    #[test]
    fn relocate_file_moves_keyfile_and_share_keys() {
        let keys = KeyManager::new(Arc::new(MemoryView::new()));
        let guard = Interception::new().suspend();
        let alice = uid("alice");
        keys.set_keyfile(&alice, "/a.txt", b"kf", &guard).unwrap();
        keys.set_share_key(&alice, "/a.txt", &alice, b"sk", &guard).unwrap();

        keys.relocate(&alice, "/a.txt", &alice, "/deep/er/b.txt", false, &guard)
            .unwrap();

        assert_eq!(keys.keyfile(&alice, "/a.txt").unwrap(), None);
        assert_eq!(
            keys.keyfile(&alice, "/deep/er/b.txt").unwrap().as_deref(),
            Some(&b"kf"[..])
        );
        assert_eq!(
            keys.share_key_recipients(&alice, "/deep/er/b.txt").unwrap(),
            vec!["alice"]
        );
    }

    #[test]
    fn account_record_defaults_when_missing() {
        let keys = KeyManager::new(Arc::new(MemoryView::new()));
        let record = keys.account_record(&uid("alice")).unwrap();
        assert!(!record.migration_completed);
        assert!(!record.recovery_enabled);
    }
}

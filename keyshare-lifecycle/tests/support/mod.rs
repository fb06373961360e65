//! Shared fixtures for lifecycle integration tests.
//!
//! Everything runs against in-memory collaborators with cheap KDF
//! parameters, so a full login costs microseconds.

#![allow(dead_code)]

use std::sync::Arc;

use keyshare_lifecycle::layout;
use keyshare_lifecycle::{
    Collaborators, EncryptionConfig, EventDispatcher, FileId, ItemType, KeyLifecycle,
    MemoryDirectory, MemorySettings, Session, ShareEvent, ShareGrant, ShareId, ShareRecord,
    UnshareEvent, UserId,
};
use keyshare_storage::{FileView, MemoryView};
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber honouring `RUST_LOG`. Safe to call
/// from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn uid(name: &str) -> UserId {
    UserId::new(name).expect("valid test user id")
}

/// Login passphrase used for `name` throughout the suites.
pub fn password(name: &str) -> String {
    format!("{name}-correct-horse")
}

pub struct Fixture {
    pub view: Arc<MemoryView>,
    pub dir: Arc<MemoryDirectory>,
    pub settings: Arc<MemorySettings>,
    pub lifecycle: Arc<KeyLifecycle>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EncryptionConfig::testing())
    }

    pub fn with_config(config: EncryptionConfig) -> Self {
        init_tracing();
        let view = Arc::new(MemoryView::new());
        let dir = Arc::new(MemoryDirectory::new());
        let settings = Arc::new(MemorySettings::new());
        let collaborators = Collaborators {
            view: view.clone(),
            catalog: dir.clone(),
            shares: dir.clone(),
            groups: dir.clone(),
            settings: settings.clone(),
        };
        let lifecycle =
            KeyLifecycle::new(collaborators, config).expect("lifecycle must build");
        Self {
            view,
            dir,
            settings,
            lifecycle: Arc::new(lifecycle),
        }
    }

    pub fn dispatcher(&self) -> EventDispatcher {
        EventDispatcher::new(self.lifecycle.clone())
    }

    /// Provisions an account the way user creation does.
    pub fn create_user(&self, name: &str) -> UserId {
        let user = uid(name);
        self.lifecycle
            .post_create_user(&user, &password(name))
            .expect("user setup must succeed");
        self.view
            .mkdir_all(&layout::user_files_root(&user))
            .expect("home directory");
        user
    }

    pub fn login(&self, user: &UserId) -> Session {
        let mut session = Session::new();
        self.lifecycle
            .login(&mut session, user, &password(user.as_str()))
            .expect("login must succeed");
        session
    }

    /// Creates a folder in `owner`'s tree and registers it.
    pub fn mkdir(&self, owner: &UserId, path: &str) -> FileId {
        self.view
            .mkdir_all(&layout::user_file_path(owner, path))
            .expect("mkdir");
        self.dir.add_file(owner, path).expect("register folder")
    }

    /// Writes an encrypted file through `actor`'s view and registers it
    /// under its owner.
    pub fn write_file(&self, actor: &UserId, path: &str, data: &[u8]) -> FileId {
        let target = self
            .lifecycle
            .resolver()
            .resolve_view(actor, path)
            .expect("resolvable path");
        let id = self
            .dir
            .add_file(&target.owner, &target.path)
            .expect("register file");
        self.lifecycle
            .encrypt_file(actor, path, data)
            .expect("encryption must succeed");
        id
    }

    /// Records a share and runs the post-share handler for it.
    pub fn share(
        &self,
        session: &Session,
        shared_by: &UserId,
        item: FileId,
        item_type: ItemType,
        grant: ShareGrant,
        file_target: &str,
        parent: Option<ShareId>,
    ) -> ShareRecord {
        let record = self
            .dir
            .add_share(shared_by, item, item_type, grant, file_target, parent)
            .expect("share recorded");
        self.lifecycle
            .post_share(session, &ShareEvent::from(&record))
            .expect("post-share must succeed");
        record
    }

    /// Removes a share and runs the post-unshare handler for it.
    pub fn unshare(&self, record: &ShareRecord) {
        self.dir.remove_share(record.id).expect("share exists");
        self.lifecycle
            .post_unshare(&UnshareEvent::from(record))
            .expect("post-unshare must succeed");
    }

    /// Users currently holding a share-key for a file.
    pub fn share_key_holders(&self, owner: &UserId, path: &str) -> Vec<String> {
        self.lifecycle
            .keys()
            .share_key_recipients(owner, path)
            .expect("listing share-keys")
    }

    /// Users that should hold a share-key for a file, sorted like
    /// [`Self::share_key_holders`].
    pub fn expected_holders(&self, owner: &UserId, path: &str) -> Vec<String> {
        let mut expected: Vec<String> = self
            .lifecycle
            .recipients()
            .recipients(owner, path, true, None)
            .expect("recipients")
            .into_iter()
            .filter(|u| self.lifecycle.keys().has_public_key(u))
            .map(String::from)
            .collect();
        expected.sort();
        expected
    }

    pub fn raw_file(&self, owner: &UserId, path: &str) -> Vec<u8> {
        self.view
            .read(&layout::user_file_path(owner, path))
            .expect("file exists")
    }
}

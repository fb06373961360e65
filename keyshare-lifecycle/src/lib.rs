//! Key lifecycle orchestration for server-side encryption with sharing.
//!
//! Every user has a key-pair whose private half is wrapped under their
//! login passphrase. Every encrypted file has a keyfile (its content key,
//! wrapped under a per-file envelope key) and one share-key per recipient
//! (the envelope key sealed to that recipient's public key). This crate
//! keeps those artifacts consistent as accounts, shares and files change:
//!
//! - [`PathResolver`] maps share events to the owner's path
//! - [`RecipientSetCalculator`] decides who must hold a share-key
//! - [`FanoutEngine`] creates and prunes share-keys
//! - [`KeyLifecycle`] implements one handler per lifecycle event
//! - [`RecoveryManager`] holds the administrator escrow
//!
//! Hosts feed events through an [`EventDispatcher`] and implement the
//! collaborator traits in [`directory`]. In-memory implementations live in
//! [`memory`].

mod account;
pub mod config;
mod content;
pub mod directory;
mod dispatcher;
mod error;
pub mod events;
mod fanout;
mod hooks;
mod interception;
mod keymanager;
pub mod layout;
pub mod memory;
mod recipients;
mod recovery;
mod resolver;
mod session;
pub mod types;

pub use account::{AccountRecord, AccountState};
pub use config::EncryptionConfig;
pub use dispatcher::EventDispatcher;
pub use error::{KeyError, KeyResult};
pub use events::{
    AbortReason, HookOutcome, LifecycleEvent, ShareEvent, ShareRequest, UnshareEvent,
};
pub use fanout::{for_each_file, BatchReport, FanoutEngine, FileOutcome, Reconciliation};
pub use hooks::{Collaborators, KeyLifecycle, LoginOutcome, PasswordChange};
pub use interception::{Interception, Suspension};
pub use keymanager::KeyManager;
pub use memory::{MemoryDirectory, MemorySettings};
pub use recipients::RecipientSetCalculator;
pub use recovery::RecoveryManager;
pub use resolver::{PathResolver, ResolvedPath};
pub use session::Session;
pub use types::{FileId, GroupId, ItemType, ShareGrant, ShareId, ShareRecord, UserId};

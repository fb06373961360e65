//! Hierarchical file store abstraction for keyshare.
//!
//! Key material and user files live in one slash-separated namespace with
//! per-user roots (`/<uid>/files`, `/<uid>/files_encryption`) and a few
//! global directories (`/public-keys`, `/owncloud_private_key`). Everything
//! above this crate talks to that namespace through [`FileView`].
//!
//! Two implementations ship here:
//! - [`MemoryView`] keeps everything in a map and counts mutations
//! - [`LocalView`] maps the namespace onto a directory on disk

mod error;
mod local;
mod memory;
pub mod path;
mod view;
mod walk;

pub use error::{StorageError, StorageResult};
pub use local::LocalView;
pub use memory::MemoryView;
pub use view::{DirEntry, FileView};
pub use walk::{all_files, FileWalker};

//! Fixed storage layout of every key artifact.
//!
//! User-relative paths (`/docs/a.txt`) are always normalized and absolute.
//!
//! ```text
//! /<uid>/files/<path>                                       user file
//! /<uid>/encryption.key                                     legacy key
//! /<uid>/files_encryption/<uid>.private.key                 wrapped private key
//! /<uid>/files_encryption/account.json                      account record
//! /<uid>/files_encryption/keyfiles/<path>.key               keyfile
//! /<uid>/files_encryption/share-keys/<path>.<r>.shareKey    share-key for r
//! /public-keys/<id>.public.key                              public key
//! /owncloud_private_key/<id>.private.key                    system private key
//! /control-file/controlfile.enc                             recovery verifier
//! ```

use keyshare_storage::path::dirname;

use crate::types::UserId;

pub const PUBLIC_KEYS_DIR: &str = "/public-keys";
pub const SYSTEM_PRIVATE_KEYS_DIR: &str = "/owncloud_private_key";
pub const CONTROL_FILE: &str = "/control-file/controlfile.enc";

const SHARE_KEY_SUFFIX: &str = ".shareKey";

pub fn user_files_root(uid: &UserId) -> String {
    format!("/{uid}/files")
}

pub fn user_file_path(uid: &UserId, path: &str) -> String {
    if path == "/" {
        user_files_root(uid)
    } else {
        format!("/{uid}/files{path}")
    }
}

/// Splits `/<uid>/files/<path>` back into its user-relative path.
pub fn strip_user_files_path<'a>(uid: &UserId, full: &'a str) -> Option<&'a str> {
    let rest = full.strip_prefix('/')?.strip_prefix(uid.as_str())?;
    let rest = rest.strip_prefix("/files")?;
    match rest {
        "" => Some("/"),
        r if r.starts_with('/') => Some(r),
        _ => None,
    }
}

pub fn private_key_path(uid: &UserId) -> String {
    format!("/{uid}/files_encryption/{uid}.private.key")
}

pub fn public_key_path(id: &UserId) -> String {
    format!("{PUBLIC_KEYS_DIR}/{id}.public.key")
}

pub fn system_private_key_path(id: &UserId) -> String {
    format!("{SYSTEM_PRIVATE_KEYS_DIR}/{id}.private.key")
}

pub fn account_record_path(uid: &UserId) -> String {
    format!("/{uid}/files_encryption/account.json")
}

pub fn legacy_key_path(uid: &UserId) -> String {
    format!("/{uid}/encryption.key")
}

pub fn keyfiles_root(uid: &UserId) -> String {
    format!("/{uid}/files_encryption/keyfiles")
}

/// Directory mirroring a user folder inside the keyfile tree.
pub fn keyfile_dir(uid: &UserId, path: &str) -> String {
    format!("{}{}", keyfiles_root(uid), path)
}

pub fn keyfile_path(uid: &UserId, path: &str) -> String {
    format!("{}{path}.key", keyfiles_root(uid))
}

pub fn share_keys_root(uid: &UserId) -> String {
    format!("/{uid}/files_encryption/share-keys")
}

/// Directory mirroring a user folder inside the share-key tree.
pub fn share_key_dir(uid: &UserId, path: &str) -> String {
    format!("{}{}", share_keys_root(uid), path)
}

/// Directory holding the share-keys of the file at `path`.
pub fn share_keys_dir_for_file(uid: &UserId, path: &str) -> String {
    let parent = dirname(path);
    if parent == "/" {
        share_keys_root(uid)
    } else {
        share_key_dir(uid, parent)
    }
}

pub fn share_key_path(owner: &UserId, path: &str, recipient: &str) -> String {
    format!("{}{path}.{recipient}{SHARE_KEY_SUFFIX}", share_keys_root(owner))
}

/// Extracts the recipient from a share-key entry name belonging to the file
/// named `file_name`.
pub fn parse_share_key_name<'a>(file_name: &str, entry: &'a str) -> Option<&'a str> {
    let recipient = entry
        .strip_suffix(SHARE_KEY_SUFFIX)?
        .strip_prefix(file_name)?
        .strip_prefix('.')?;
    (!recipient.is_empty() && !recipient.contains('.')).then_some(recipient)
}

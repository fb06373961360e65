//! Key lifecycle error types.

use keyshare_crypto::CryptoError;
use keyshare_storage::StorageError;
use thiserror::Error;

use crate::types::UserId;

/// Result type for key lifecycle operations.
pub type KeyResult<T> = Result<T, KeyError>;

/// Errors that can occur while orchestrating key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Provisioning or unlocking the account's keys failed. Blocks login.
    #[error("key setup failed for {user}: {reason}")]
    SetupFailure { user: String, reason: String },

    /// Wrong passphrase or a corrupt key artifact.
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    #[error("no unambiguous re-share path for {path}")]
    PathResolutionAmbiguity { path: String },

    #[error("fan-out failed for {failed} of {total} files")]
    PartialFanoutFailure { failed: usize, total: usize },

    /// The recovery passphrase did not validate. Nothing was changed.
    #[error("recovery passphrase rejected")]
    RecoveryVerificationFailure,

    #[error("session holds no unlocked key for this user")]
    Locked,

    #[error("no public key for {0}")]
    MissingPublicKey(UserId),

    #[error("recovery key is not configured")]
    RecoveryNotConfigured,

    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    #[error("share not found: {0}")]
    ShareNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeyError {
    pub(crate) fn setup(user: &UserId, reason: impl Into<String>) -> Self {
        KeyError::SetupFailure {
            user: user.to_string(),
            reason: reason.into(),
        }
    }

    /// Maps a crypto failure on a key artifact into `DecryptionFailure`.
    pub(crate) fn decryption(what: &str) -> impl FnOnce(CryptoError) -> KeyError + '_ {
        move |e| KeyError::DecryptionFailure(format!("{what}: {e}"))
    }
}

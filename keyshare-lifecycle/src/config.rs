//! Encryption configuration.

use std::path::Path;

use keyshare_crypto::KdfParams;
use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};
use crate::types::UserId;

/// Configuration for the key lifecycle engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Global sharing switch. When off, every file's recipients are just
    /// its owner (and the recovery key, if active).
    pub sharing_enabled: bool,

    /// Reserved pseudo-user that holds share-keys for public links.
    pub public_share_key_id: String,

    /// Preferred id for the recovery key-pair when none is recorded yet.
    pub recovery_key_id: Option<String>,

    /// Argon2id parameters used when wrapping private keys.
    pub kdf: KdfParams,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            sharing_enabled: true,
            public_share_key_id: "pubShare".to_string(),
            recovery_key_id: None,
            kdf: KdfParams::default(),
        }
    }
}

impl EncryptionConfig {
    /// Cheap KDF parameters for test suites.
    pub fn testing() -> Self {
        Self {
            kdf: KdfParams::testing(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> KeyResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| KeyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> KeyResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| KeyError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> KeyResult<()> {
        UserId::new(self.public_share_key_id.as_str()).map_err(|_| {
            KeyError::Config(format!(
                "public_share_key_id {:?} is not a valid user id",
                self.public_share_key_id
            ))
        })?;
        if let Some(id) = &self.recovery_key_id {
            UserId::new(id.as_str()).map_err(|_| {
                KeyError::Config(format!("recovery_key_id {id:?} is not a valid user id"))
            })?;
        }
        let kdf = &self.kdf;
        if kdf.iterations == 0 || kdf.parallelism == 0 || kdf.memory_kib < 8 * kdf.parallelism {
            return Err(KeyError::Config(format!("degenerate kdf parameters {kdf:?}")));
        }
        Ok(())
    }

    pub(crate) fn public_share_user(&self) -> KeyResult<UserId> {
        UserId::new(self.public_share_key_id.as_str())
    }
}

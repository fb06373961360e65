//! Abstract key-crypto interface consumed by the lifecycle layer.
//!
//! The lifecycle crate depends on `Arc<dyn KeyCrypto>` and only ever sees
//! serialized artifacts (wrapped private keys, share-keys, keyfiles).
//! `StandardCrypto` is the production implementation.

use crate::envelope::{
    self, PassphraseProtectedKey, PublicKey, SealedEnvelope, SecretKey, UserKeyPair,
};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{DerivedKey, KdfParams};
use crate::{legacy, EncryptedData};

/// Key operations the orchestration needs from the crypto layer.
pub trait KeyCrypto: Send + Sync {
    /// Generates a fresh asymmetric key pair.
    fn generate_keypair(&self) -> UserKeyPair;

    /// Wraps a private key under a passphrase, returning the stored form.
    fn encrypt_private_key(&self, sk: &SecretKey, passphrase: &str) -> CryptoResult<Vec<u8>>;

    /// Unwraps a stored private key. Fails on a wrong passphrase.
    fn decrypt_private_key(&self, wrapped: &[u8], passphrase: &str) -> CryptoResult<SecretKey>;

    /// Unwraps a legacy single-key blob.
    fn decrypt_legacy_key(&self, blob: &[u8], passphrase: &str) -> CryptoResult<DerivedKey>;

    /// Seals key material for one recipient (a share-key).
    fn seal(&self, key: &[u8], recipient: &PublicKey) -> CryptoResult<Vec<u8>>;

    /// Opens a share-key with the recipient's private key.
    fn open(&self, sealed: &[u8], sk: &SecretKey) -> CryptoResult<Vec<u8>>;

    /// Symmetric wrap of key material (keyfiles).
    fn wrap(&self, key: &DerivedKey, data: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Inverse of [`KeyCrypto::wrap`].
    fn unwrap(&self, key: &DerivedKey, wrapped: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// Production implementation: Argon2id, ChaCha20-Poly1305, X25519 boxes.
#[derive(Clone, Debug, Default)]
pub struct StandardCrypto {
    kdf: KdfParams,
}

impl StandardCrypto {
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }
}

impl KeyCrypto for StandardCrypto {
    fn generate_keypair(&self) -> UserKeyPair {
        envelope::generate_keypair()
    }

    fn encrypt_private_key(&self, sk: &SecretKey, passphrase: &str) -> CryptoResult<Vec<u8>> {
        let protected = envelope::encrypt_private_key(sk, passphrase, &self.kdf)?;
        Ok(serde_json::to_vec(&protected)?)
    }

    fn decrypt_private_key(&self, wrapped: &[u8], passphrase: &str) -> CryptoResult<SecretKey> {
        let protected: PassphraseProtectedKey = serde_json::from_slice(wrapped)
            .map_err(|e| CryptoError::InvalidFormat(format!("private key: {e}")))?;
        envelope::decrypt_private_key(&protected, passphrase)
    }

    fn decrypt_legacy_key(&self, blob: &[u8], passphrase: &str) -> CryptoResult<DerivedKey> {
        legacy::unwrap_legacy_key(blob, passphrase)
    }

    fn seal(&self, key: &[u8], recipient: &PublicKey) -> CryptoResult<Vec<u8>> {
        let sealed = envelope::seal_key(key, recipient)?;
        Ok(serde_json::to_vec(&sealed)?)
    }

    fn open(&self, sealed: &[u8], sk: &SecretKey) -> CryptoResult<Vec<u8>> {
        let sealed: SealedEnvelope = serde_json::from_slice(sealed)
            .map_err(|e| CryptoError::InvalidFormat(format!("share-key: {e}")))?;
        envelope::open_key(&sealed, sk)
    }

    fn wrap(&self, key: &DerivedKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let encrypted = crate::encrypt(key, data)?;
        Ok(serde_json::to_vec(&encrypted)?)
    }

    fn unwrap(&self, key: &DerivedKey, wrapped: &[u8]) -> CryptoResult<Vec<u8>> {
        let encrypted: EncryptedData = serde_json::from_slice(wrapped)
            .map_err(|e| CryptoError::InvalidFormat(format!("keyfile: {e}")))?;
        crate::decrypt(key, &encrypted)
    }
}

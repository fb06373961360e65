//! Legacy single-key scheme, kept only to migrate old accounts.
//!
//! Before per-file keys existed every file of a user was encrypted under one
//! symmetric key, itself wrapped under the login passphrase. The wrapping key
//! is derived with a fixed domain salt because the legacy format stored none.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{DerivedKey, KdfParams, Salt, KEY_SIZE};
use crate::{decrypt, encrypt, EncryptedData};

/// Magic prefix of file content encrypted under a legacy key.
pub const LEGACY_MAGIC: &[u8] = b"KSLEG0\n";

const LEGACY_SALT: [u8; 16] = *b"keyshare-legacy\0";

// Frozen with the legacy format; existing blobs depend on these exact costs.
fn legacy_params() -> KdfParams {
    KdfParams {
        memory_kib: 4096,
        iterations: 3,
        parallelism: 1,
    }
}

fn legacy_wrapping_key(passphrase: &str) -> CryptoResult<DerivedKey> {
    crate::derive_key(passphrase, &Salt::from_bytes(LEGACY_SALT), &legacy_params())
}

/// Wraps a legacy key under a passphrase (the `encryption.key` blob).
pub fn wrap_legacy_key(key: &DerivedKey, passphrase: &str) -> CryptoResult<Vec<u8>> {
    let wrapping = legacy_wrapping_key(passphrase)?;
    let encrypted = encrypt(&wrapping, key.as_bytes())?;
    Ok(serde_json::to_vec(&encrypted)?)
}

/// Unwraps a legacy key blob with the login passphrase.
pub fn unwrap_legacy_key(blob: &[u8], passphrase: &str) -> CryptoResult<DerivedKey> {
    let encrypted: EncryptedData = serde_json::from_slice(blob)
        .map_err(|e| CryptoError::InvalidFormat(format!("legacy key blob: {e}")))?;
    let wrapping = legacy_wrapping_key(passphrase)?;
    let plaintext = decrypt(&wrapping, &encrypted)?;
    if plaintext.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: plaintext.len(),
        });
    }
    DerivedKey::from_slice(&plaintext)
}

/// Whether `data` is file content in the legacy container.
pub fn is_legacy_content(data: &[u8]) -> bool {
    data.starts_with(LEGACY_MAGIC)
}

/// Encrypts file content in the legacy container.
pub fn encrypt_legacy_content(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let encrypted = encrypt(key, plaintext)?;
    let mut out = LEGACY_MAGIC.to_vec();
    out.extend_from_slice(&serde_json::to_vec(&encrypted)?);
    Ok(out)
}

/// Decrypts file content from the legacy container.
pub fn decrypt_legacy_content(key: &DerivedKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let body = data
        .strip_prefix(LEGACY_MAGIC)
        .ok_or_else(|| CryptoError::InvalidFormat("missing legacy header".to_string()))?;
    let encrypted: EncryptedData = serde_json::from_slice(body)
        .map_err(|e| CryptoError::InvalidFormat(format!("legacy content: {e}")))?;
    decrypt(key, &encrypted)
}

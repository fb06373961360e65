//! Container format for encrypted file content.
//!
//! An encrypted file is the `KSENC1\n` magic followed by a JSON
//! `EncryptedData` under the file's content key. Anything without a known
//! magic is treated as plaintext.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use crate::{decrypt, encrypt, EncryptedData};

/// Magic prefix of file content in the current scheme.
pub const CONTENT_MAGIC: &[u8] = b"KSENC1\n";

/// Whether `data` is file content in the current container.
pub fn is_encrypted_content(data: &[u8]) -> bool {
    data.starts_with(CONTENT_MAGIC)
}

/// Encrypts file content under its content key.
pub fn encrypt_content(content_key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let encrypted = encrypt(content_key, plaintext)?;
    let mut out = CONTENT_MAGIC.to_vec();
    out.extend_from_slice(&serde_json::to_vec(&encrypted)?);
    Ok(out)
}

fn parse(data: &[u8]) -> CryptoResult<EncryptedData> {
    let body = data
        .strip_prefix(CONTENT_MAGIC)
        .ok_or_else(|| CryptoError::InvalidFormat("missing content header".to_string()))?;
    serde_json::from_slice(body).map_err(|e| CryptoError::InvalidFormat(format!("content: {e}")))
}

/// Decrypts file content with its content key.
pub fn decrypt_content(content_key: &DerivedKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    decrypt(content_key, &parse(data)?)
}

/// Plaintext size of encrypted content, computed without any key.
pub fn plaintext_len(data: &[u8]) -> CryptoResult<u64> {
    Ok(parse(data)?.plaintext_len() as u64)
}

//! Asymmetric key material: user key-pairs and share-keys.
//!
//! A share-key is a file's envelope key sealed to one recipient with an
//! anonymous X25519 box (XSalsa20-Poly1305). A throwaway sender key is
//! generated per seal and shipped alongside the ciphertext, so the holder of
//! the recipient's private key is the only one able to open it.
//!
//! Private keys are stored wrapped under the owner's passphrase
//! ([`PassphraseProtectedKey`]); public keys are stored as base64 text.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use crypto_box::SalsaBox;
use crypto_box::aead::Aead;
use crypto_box::aead::generic_array::GenericArray;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KdfParams, SALT_SIZE, Salt, derive_key};
use crate::{EncryptedData, decrypt, encrypt};

pub use crypto_box::{PublicKey, SecretKey};

/// Length of X25519 public and secret keys.
pub const X25519_KEY_SIZE: usize = 32;

const BOX_NONCE_SIZE: usize = 24;

/// A user's (or pseudo-user's) asymmetric key-pair. The secret half
/// zeroizes itself on drop.
pub struct UserKeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

/// Stored form of a share-key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// Public half of the per-seal sender key.
    pub sender: [u8; X25519_KEY_SIZE],
    pub nonce: [u8; BOX_NONCE_SIZE],
    /// Box ciphertext, tag included.
    pub ciphertext: Vec<u8>,
}

/// Stored form of a private key. Carries its own salt and KDF cost so the
/// passphrase alone unlocks it, even after the defaults change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassphraseProtectedKey {
    pub salt: [u8; SALT_SIZE],
    #[serde(default)]
    pub kdf: KdfParams,
    pub encrypted: EncryptedData,
}

pub fn generate_keypair() -> UserKeyPair {
    let secret = SecretKey::generate(&mut OsRng);
    UserKeyPair {
        public: secret.public_key(),
        secret,
    }
}

/// Seals `key` so only the holder of `recipient`'s private key can open it.
pub fn seal_key(key: &[u8], recipient: &PublicKey) -> CryptoResult<SealedEnvelope> {
    let sender = SecretKey::generate(&mut OsRng);
    let mut nonce = [0u8; BOX_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = SalsaBox::new(recipient, &sender)
        .encrypt(GenericArray::from_slice(&nonce), key)
        .map_err(|e| CryptoError::Encryption(format!("sealing share-key: {e}")))?;

    Ok(SealedEnvelope {
        sender: *sender.public_key().as_bytes(),
        nonce,
        ciphertext,
    })
}

/// Opens a share-key. Fails on the wrong private key or any tampering.
pub fn open_key(sealed: &SealedEnvelope, recipient: &SecretKey) -> CryptoResult<Vec<u8>> {
    let sender = PublicKey::from(sealed.sender);
    SalsaBox::new(&sender, recipient)
        .decrypt(GenericArray::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|_| CryptoError::Decryption("share-key does not open with this key".into()))
}

/// Wraps a private key under `passphrase` with a fresh salt.
pub fn encrypt_private_key(
    sk: &SecretKey,
    passphrase: &str,
    params: &KdfParams,
) -> CryptoResult<PassphraseProtectedKey> {
    let salt = Salt::random();
    let kek = derive_key(passphrase, &salt, params)?;
    let raw = Zeroizing::new(sk.to_bytes());
    Ok(PassphraseProtectedKey {
        salt: *salt.as_bytes(),
        kdf: params.clone(),
        encrypted: encrypt(&kek, raw.as_slice())?,
    })
}

/// Unwraps a private key. A wrong passphrase surfaces as a decryption
/// error from the AEAD tag check.
pub fn decrypt_private_key(
    wrapped: &PassphraseProtectedKey,
    passphrase: &str,
) -> CryptoResult<SecretKey> {
    let kek = derive_key(passphrase, &Salt::from_bytes(wrapped.salt), &wrapped.kdf)?;
    let raw = Zeroizing::new(decrypt(&kek, &wrapped.encrypted)?);
    Ok(SecretKey::from(key_array(&raw)?))
}

pub fn encode_public_key(pk: &PublicKey) -> String {
    STANDARD.encode(pk.as_bytes())
}

/// Parses the base64 text of a public key file. Surrounding whitespace is
/// ignored.
pub fn decode_public_key(text: &str) -> CryptoResult<PublicKey> {
    let raw = STANDARD
        .decode(text.trim())
        .map_err(|e| CryptoError::InvalidFormat(format!("public key is not base64: {e}")))?;
    Ok(PublicKey::from(key_array(&raw)?))
}

fn key_array(raw: &[u8]) -> CryptoResult<[u8; X25519_KEY_SIZE]> {
    raw.try_into().map_err(|_| CryptoError::InvalidKeyLength {
        expected: X25519_KEY_SIZE,
        actual: raw.len(),
    })
}

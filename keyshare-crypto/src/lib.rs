//! Key material primitives for keyshare.
//!
//! Provides:
//! - Argon2id key derivation from passphrases
//! - ChaCha20-Poly1305 authenticated encryption
//! - X25519 envelopes for per-recipient share-keys
//! - Passphrase-protected private keys
//!
//! # Architecture
//!
//! Every file is protected by three layers of keys:
//!
//! 1. **Content key**: a random key that encrypts the file body.
//!
//! 2. **Envelope key**: a random per-file key that encrypts the content key.
//!    The result is the file's *keyfile*.
//!
//! 3. **Share-keys**: the envelope key sealed to each recipient's X25519
//!    public key, one per user allowed to read the file.
//!
//! Granting or revoking access only adds or removes share-keys; the keyfile
//! and the file body are never rewritten. Private keys are stored wrapped
//! under the user's passphrase, so changing the passphrase only rewraps one
//! small blob.

mod cipher;
pub mod content;
pub mod envelope;
mod error;
mod key;
pub mod legacy;
pub mod provider;

pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use content::{decrypt_content, encrypt_content, is_encrypted_content, plaintext_len};
pub use envelope::{
    decode_public_key, decrypt_private_key, encode_public_key, encrypt_private_key,
    generate_keypair, open_key, seal_key, PassphraseProtectedKey, PublicKey, SealedEnvelope,
    SecretKey, UserKeyPair,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use legacy::{is_legacy_content, unwrap_legacy_key, wrap_legacy_key};
pub use provider::{KeyCrypto, StandardCrypto};

use keyshare_crypto::envelope::{
    decode_public_key, decrypt_private_key, encode_public_key, encrypt_private_key,
    generate_keypair, open_key, seal_key,
};
use keyshare_crypto::{CryptoError, KdfParams, KeyCrypto, StandardCrypto};

#[test]
fn keypair_halves_match() {
    let kp = generate_keypair();
    assert_eq!(kp.secret.public_key().as_bytes(), kp.public.as_bytes());
    assert_ne!(generate_keypair().public.as_bytes(), kp.public.as_bytes());
}

#[test]
fn seal_open_roundtrip() {
    let recipient = generate_keypair();
    let key = b"this-is-a-32-byte-envelope-key!!";

    let envelope = seal_key(key, &recipient.public).unwrap();
    assert_eq!(open_key(&envelope, &recipient.secret).unwrap(), key);
}

#[test]
fn sealing_twice_yields_distinct_envelopes() {
    let recipient = generate_keypair();
    let a = seal_key(b"k", &recipient.public).unwrap();
    let b = seal_key(b"k", &recipient.public).unwrap();
    assert_ne!(a.sender, b.sender);
}

#[test]
fn wrong_recipient_key_fails_to_open() {
    let target = generate_keypair();
    let other = generate_keypair();
    let envelope = seal_key(b"secret", &target.public).unwrap();
    assert!(matches!(
        open_key(&envelope, &other.secret),
        Err(CryptoError::Decryption(_))
    ));
}

#[test]
fn tampered_ciphertext_fails() {
    let recipient = generate_keypair();
    let mut envelope = seal_key(b"secret", &recipient.public).unwrap();
    if let Some(byte) = envelope.ciphertext.first_mut() {
        *byte ^= 0xFF;
    }
    assert!(open_key(&envelope, &recipient.secret).is_err());
}

#[test]
fn private_key_passphrase_roundtrip() {
    let kp = generate_keypair();
    let protected = encrypt_private_key(&kp.secret, "correct horse", &KdfParams::testing()).unwrap();
    let sk = decrypt_private_key(&protected, "correct horse").unwrap();
    assert_eq!(sk.to_bytes(), kp.secret.to_bytes());
}

#[test]
fn private_key_wrong_passphrase_fails() {
    let kp = generate_keypair();
    let protected = encrypt_private_key(&kp.secret, "correct horse", &KdfParams::testing()).unwrap();
    assert!(decrypt_private_key(&protected, "battery staple").is_err());
}

#[test]
fn wrapped_key_remembers_its_cost_parameters() {
    let kp = generate_keypair();
    let params = KdfParams {
        memory_kib: 128,
        iterations: 1,
        parallelism: 1,
    };
    let protected = encrypt_private_key(&kp.secret, "pw", &params).unwrap();
    assert_eq!(protected.kdf, params);

    // Decrypting never needs the parameters from the caller.
    let json = serde_json::to_vec(&protected).unwrap();
    let sk = StandardCrypto::new(KdfParams::testing())
        .decrypt_private_key(&json, "pw")
        .unwrap();
    assert_eq!(sk.to_bytes(), kp.secret.to_bytes());
}

#[test]
fn public_key_text_roundtrip() {
    let kp = generate_keypair();
    let text = encode_public_key(&kp.public);
    let back = decode_public_key(&format!("{text}\n")).unwrap();
    assert_eq!(back.as_bytes(), kp.public.as_bytes());
}

#[test]
fn public_key_text_rejects_garbage() {
    assert!(matches!(
        decode_public_key("not base64 !!"),
        Err(CryptoError::InvalidFormat(_))
    ));
    assert!(matches!(
        decode_public_key("AAAA"),
        Err(CryptoError::InvalidKeyLength { expected: 32, .. })
    ));
}

#[test]
fn empty_passphrase_wraps_link_share_key() {
    let crypto = StandardCrypto::new(KdfParams::testing());
    let kp = crypto.generate_keypair();
    let wrapped = crypto.encrypt_private_key(&kp.secret, "").unwrap();
    let sk = crypto.decrypt_private_key(&wrapped, "").unwrap();
    assert_eq!(sk.to_bytes(), kp.secret.to_bytes());
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn seal_open_always_roundtrips(key in proptest::collection::vec(any::<u8>(), 0..256)) {
            let recipient = generate_keypair();
            let envelope = seal_key(&key, &recipient.public).unwrap();
            let recovered = open_key(&envelope, &recipient.secret).unwrap();
            prop_assert_eq!(recovered, key);
        }

        #[test]
        fn private_key_wrap_roundtrips(passphrase in ".{0,24}") {
            let crypto = StandardCrypto::new(KdfParams::testing());
            let kp = crypto.generate_keypair();
            let wrapped = crypto.encrypt_private_key(&kp.secret, &passphrase).unwrap();
            let sk = crypto.decrypt_private_key(&wrapped, &passphrase).unwrap();
            prop_assert_eq!(sk.to_bytes(), kp.secret.to_bytes());
        }
    }
}

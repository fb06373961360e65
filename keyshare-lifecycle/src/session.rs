//! Request-scoped key context.

use std::fmt;

use keyshare_crypto::{DerivedKey, SecretKey};

use crate::error::{KeyError, KeyResult};
use crate::types::UserId;

/// Decrypted key material for the duration of one request.
///
/// Created empty, bound to a user by a successful login and dropped (or
/// locked) when the request ends. Both key types zeroize themselves on drop.
#[derive(Default)]
pub struct Session {
    user: Option<UserId>,
    private_key: Option<SecretKey>,
    legacy_key: Option<DerivedKey>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the session to `user` with their unlocked private key.
    pub fn unlock(&mut self, user: UserId, private_key: SecretKey) {
        if self.user.as_ref() != Some(&user) {
            self.legacy_key = None;
        }
        self.user = Some(user);
        self.private_key = Some(private_key);
    }

    /// Drops all key material but remembers who the session belonged to.
    pub fn lock(&mut self) {
        self.private_key = None;
        self.legacy_key = None;
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn is_unlocked_for(&self, user: &UserId) -> bool {
        self.user.as_ref() == Some(user) && self.private_key.is_some()
    }

    pub fn is_locked_for(&self, user: &UserId) -> bool {
        self.user.as_ref() == Some(user) && self.private_key.is_none()
    }

    /// The private key of `user`, if this session holds it.
    pub fn private_key(&self, user: &UserId) -> KeyResult<&SecretKey> {
        match (&self.user, &self.private_key) {
            (Some(u), Some(sk)) if u == user => Ok(sk),
            _ => Err(KeyError::Locked),
        }
    }

    pub fn set_legacy_key(&mut self, key: DerivedKey) {
        self.legacy_key = Some(key);
    }

    pub fn legacy_key(&self) -> Option<&DerivedKey> {
        self.legacy_key.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("unlocked", &self.private_key.is_some())
            .field("legacy_key", &self.legacy_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyshare_crypto::generate_keypair;

    #[test]
    fn key_is_only_served_to_its_user() {
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();
        let mut session = Session::new();
        assert!(matches!(session.private_key(&alice), Err(KeyError::Locked)));

        session.unlock(alice.clone(), generate_keypair().secret);
        assert!(session.private_key(&alice).is_ok());
        assert!(matches!(session.private_key(&bob), Err(KeyError::Locked)));
    }

    #[test]
    fn lock_keeps_identity_but_drops_keys() {
        let alice = UserId::new("alice").unwrap();
        let mut session = Session::new();
        session.unlock(alice.clone(), generate_keypair().secret);
        session.set_legacy_key(keyshare_crypto::generate_random_key());
        session.lock();
        assert!(session.is_locked_for(&alice));
        assert!(session.legacy_key().is_none());
        assert_eq!(session.user(), Some(&alice));
    }

    #[test]
    fn debug_hides_key_material() {
        let mut session = Session::new();
        session.unlock(UserId::new("alice").unwrap(), generate_keypair().secret);
        let printed = format!("{session:?}");
        assert!(printed.contains("unlocked: true"));
    }
}

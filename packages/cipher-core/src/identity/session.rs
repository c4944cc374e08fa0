//! The active session and its device-persisted identity fields.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::crypto::{decrypt_message, PrivateKeyHandle};
use crate::error::{Error, Result};

/// A logged-in user on this device
///
/// Clones share one key slot. Logging out, or starting another session,
/// empties the slot for every clone: the key is dropped (and zeroized) and
/// each clone's `decrypt` fails with `NoSession` from then on.
#[derive(Clone)]
pub struct Session {
    id: String,
    username: String,
    display_name: String,
    key: Arc<RwLock<Option<PrivateKeyHandle>>>,
}

impl Session {
    pub(crate) fn new(identity: SessionIdentity, private_key: PrivateKeyHandle) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            display_name: identity.display_name,
            key: Arc::new(RwLock::new(Some(private_key))),
        }
    }

    /// Directory ID of the user
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Login name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Display name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether the private key is still held
    pub fn is_active(&self) -> bool {
        self.key.read().is_some()
    }

    /// Decrypt a ciphertext addressed to this user
    ///
    /// `NoSession` once the session has been revoked.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        self.with_key(|key| decrypt_message(ciphertext, key))
    }

    /// Run `f` against the private key while it is still held
    pub(crate) fn with_key<T>(
        &self,
        f: impl FnOnce(&PrivateKeyHandle) -> Result<T>,
    ) -> Result<T> {
        match self.key.read().as_ref() {
            Some(key) => f(key),
            None => Err(Error::NoSession),
        }
    }

    /// Drop the key for this session and all of its clones
    pub(crate) fn revoke(&self) -> bool {
        self.key.write().take().is_some()
    }

    /// Whether `other` is a clone of this session
    pub(crate) fn same_slot(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.key, &other.key)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("active", &self.is_active())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Non-secret identity fields kept in the device store
///
/// Serialized as `{"id", "username", "displayName"}`, the shape existing
/// clients already write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionIdentity {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encrypt_message;
    use crate::crypto::fixtures::ALICE;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            id: "u1".into(),
            username: "alice".into(),
            display_name: "Alice".into(),
        }
    }

    fn alice_session() -> Session {
        let exported = ALICE.private().export().unwrap();
        Session::new(identity(), PrivateKeyHandle::import(&exported).unwrap())
    }

    #[test]
    fn test_identity_json_shape() {
        let json = serde_json::to_string(&identity()).unwrap();
        assert_eq!(json, r#"{"id":"u1","username":"alice","displayName":"Alice"}"#);

        let parsed: SessionIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, identity());
    }

    #[test]
    fn test_revoke_reaches_every_clone() {
        let session = alice_session();
        let clone = session.clone();
        let ciphertext = encrypt_message("hi", ALICE.public()).unwrap();

        assert_eq!(clone.decrypt(&ciphertext).unwrap(), "hi");
        assert!(session.same_slot(&clone));

        assert!(session.revoke());
        assert!(!session.revoke());

        assert!(!clone.is_active());
        assert!(matches!(clone.decrypt(&ciphertext), Err(Error::NoSession)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", alice_session());
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("active: true"));
    }
}

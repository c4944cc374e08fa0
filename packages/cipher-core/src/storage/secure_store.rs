//! # Device Store
//!
//! Device-local key-value storage for session continuity.
//!
//! ## What We Store
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DEVICE-LOCAL STORAGE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  cipher_chat_auth     {id, username, display_name}   always             │
//! │                                                                         │
//! │  cipher_private_key   base64 PKCS#8, UNWRAPPED      DeviceStore         │
//! │                                                      residency only     │
//! │                                                                         │
//! │  Both entries are removed on logout.                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Platform backends (keychain, keystore, browser storage) implement
//! [`DeviceStore`]; [`MemorySecureStore`] is the in-process backend.

use std::collections::HashMap;

use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::error::Result;

/// Key names for device storage
pub mod keys {
    /// Non-secret identity fields of the active session
    pub const SESSION_IDENTITY: &str = "cipher_chat_auth";

    /// Exported private key, only under device residency
    pub const SESSION_PRIVATE_KEY: &str = "cipher_private_key";
}

/// Device-local key-value storage
///
/// Backends report failures as `Error::StorageReadError` or
/// `Error::StorageWriteError`.
pub trait DeviceStore: Send + Sync {
    /// Store a value, replacing any previous one
    fn store(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a value
    fn retrieve(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>>;

    /// Delete a value; returns whether it existed
    fn delete(&self, key: &str) -> Result<bool>;

    /// Check if a key exists
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.retrieve(key)?.is_some())
    }
}

/// In-memory device store
///
/// Values are zeroized when overwritten, deleted, or dropped.
#[derive(Default)]
pub struct MemorySecureStore {
    memory: RwLock<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemorySecureStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStore for MemorySecureStore {
    fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut storage = self.memory.write();
        storage.insert(key.to_string(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let storage = self.memory.read();
        Ok(storage.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut storage = self.memory.write();
        Ok(storage.remove(key).is_some())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let storage = self.memory.read();
        Ok(storage.contains_key(key))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_retrieve() {
        let store = MemorySecureStore::new();

        store.store("test-key", b"test-value").unwrap();

        let value = store.retrieve("test-key").unwrap().unwrap();
        assert_eq!(value.as_slice(), b"test-value");

        let deleted = store.delete("test-key").unwrap();
        assert!(deleted);

        let value = store.retrieve("test-key").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_overwrite() {
        let store = MemorySecureStore::new();

        store.store("k", b"first").unwrap();
        store.store("k", b"second").unwrap();

        assert_eq!(store.retrieve("k").unwrap().unwrap().as_slice(), b"second");
    }

    #[test]
    fn test_exists() {
        let store = MemorySecureStore::new();

        assert!(!store.exists("nonexistent").unwrap());

        store.store("exists", b"data").unwrap();
        assert!(store.exists("exists").unwrap());
    }

    #[test]
    fn test_delete_missing_is_not_an_error() {
        let store = MemorySecureStore::new();
        assert!(!store.delete(keys::SESSION_PRIVATE_KEY).unwrap());
    }
}

//! # Storage Module
//!
//! Boundary contracts for the collaborators Cipher Core consumes but does
//! not own, plus in-memory implementations for tests and local use.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE BOUNDARY                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  UserDirectory (remote, shared)                                 │    │
//! │  │  ──────────────────────────────                                 │    │
//! │  │  users: id, username, display_name,                             │    │
//! │  │         public_key (base64 SPKI),                               │    │
//! │  │         wrapped_private_key (base64 salt‖nonce‖ct)              │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  MessageLog (remote, shared)                                    │    │
//! │  │  ──────────────────────────                                     │    │
//! │  │  messages: id, sender_id, recipient_id, ciphertext, created_at  │    │
//! │  │  + push notification of every insert                            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  DeviceStore (local)                                            │    │
//! │  │  ───────────────────                                            │    │
//! │  │  cipher_chat_auth   → non-secret identity fields (JSON)         │    │
//! │  │  cipher_private_key → only with KeyResidency::DeviceStore       │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage never interprets key material or ciphertext. Every such field is
//! an opaque string produced and consumed by the crypto module.

mod memory;
mod secure_store;

pub use memory::{MemoryMessageLog, MemoryUserDirectory};
pub use secure_store::{keys, DeviceStore, MemorySecureStore};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

// ============================================================================
// RECORDS
// ============================================================================

/// A persisted user as the directory returns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Directory-assigned ID
    pub id: String,
    /// Unique login name
    pub username: String,
    /// Name shown to other users
    pub display_name: String,
    /// base64(SPKI DER) public key
    pub public_key: String,
    /// Vault-wrapped base64 private key
    pub wrapped_private_key: String,
    /// Unix timestamp (milliseconds)
    pub created_at: i64,
}

/// A user about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Unique login name
    pub username: String,
    /// Name shown to other users
    pub display_name: String,
    /// base64(SPKI DER) public key
    pub public_key: String,
    /// Vault-wrapped base64 private key
    pub wrapped_private_key: String,
}

/// A stored message; `ciphertext` is opaque to storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Log-assigned ID
    pub id: String,
    /// Sender's user ID
    pub sender_id: String,
    /// Recipient's user ID
    pub recipient_id: String,
    /// base64 OAEP ciphertext for the recipient
    pub ciphertext: String,
    /// Unix timestamp (milliseconds)
    pub created_at: i64,
}

impl MessageRecord {
    /// Whether this record belongs to the conversation between `a` and `b`
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.recipient_id == b)
            || (self.sender_id == b && self.recipient_id == a)
    }
}

// ============================================================================
// COLLABORATOR CONTRACTS
// ============================================================================

/// The user table
pub trait UserDirectory: Send + Sync {
    /// Look a user up by login name
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Insert a user
    ///
    /// Must return `Error::UsernameTaken` if the username already exists.
    fn insert_user(&self, user: NewUser) -> Result<UserRecord>;

    /// Look a user up by ID
    fn get_user_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    /// All users, in creation order
    fn list_users(&self) -> Result<Vec<UserRecord>>;
}

/// The message table and its realtime feed
pub trait MessageLog: Send + Sync {
    /// Persist a ciphertext and notify subscribers
    fn insert_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        ciphertext: &str,
    ) -> Result<MessageRecord>;

    /// Messages between two users, oldest first
    fn list_messages(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRecord>>;

    /// Subscribe to records inserted from now on
    fn subscribe(&self) -> broadcast::Receiver<MessageRecord>;
}

//! In-memory user directory and message log.

use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{MessageLog, MessageRecord, NewUser, UserDirectory, UserRecord};
use crate::error::{Error, Result};

/// Buffered notifications per subscriber before it starts lagging
const FEED_CAPACITY: usize = 256;

/// User directory backed by a `Vec`
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Vec<UserRecord>>,
}

impl MemoryUserDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    fn insert_user(&self, user: NewUser) -> Result<UserRecord> {
        let mut users = self.users.write();

        // Uniqueness is checked under the write lock, like a UNIQUE constraint
        if users.iter().any(|u| u.username == user.username) {
            return Err(Error::UsernameTaken);
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username: user.username,
            display_name: user.display_name,
            public_key: user.public_key,
            wrapped_private_key: user.wrapped_private_key,
            created_at: crate::time::now_timestamp_millis(),
        };
        users.push(record.clone());

        Ok(record)
    }

    fn get_user_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    fn list_users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.users.read().clone())
    }
}

/// Message log backed by a `Vec`, with a broadcast feed of inserts
pub struct MemoryMessageLog {
    messages: RwLock<Vec<MessageRecord>>,
    feed: broadcast::Sender<MessageRecord>,
}

impl MemoryMessageLog {
    /// Create an empty log
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            messages: RwLock::new(Vec::new()),
            feed,
        }
    }

    /// Every stored record, in insertion order
    pub fn all(&self) -> Vec<MessageRecord> {
        self.messages.read().clone()
    }
}

impl Default for MemoryMessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog for MemoryMessageLog {
    fn insert_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        ciphertext: &str,
    ) -> Result<MessageRecord> {
        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            ciphertext: ciphertext.to_string(),
            created_at: crate::time::now_timestamp_millis(),
        };
        self.messages.write().push(record.clone());

        // No subscribers is fine; the record is still stored
        let _ = self.feed.send(record.clone());

        Ok(record)
    }

    fn list_messages(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRecord>> {
        // Insertion order is chronological for an append-only Vec
        Ok(self
            .messages
            .read()
            .iter()
            .filter(|m| m.is_between(user_a, user_b))
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<MessageRecord> {
        self.feed.subscribe()
    }
}

//! # Messaging Module
//!
//! End-to-end encrypted one-to-one chat over a [`MessageLog`].
//!
//! ## Message Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MESSAGE FLOW                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Sender (Alice)                                                         │
//! │  ─────────────────────────────────────────────────────────────          │
//! │                                                                         │
//! │  1. Look up recipient           UserDirectory::get_user_by_id           │
//! │  2. Import recipient key        PublicKeyHandle::import (cached)        │
//! │  3. Encrypt                     RSA-OAEP(SHA-256), fresh randomness     │
//! │  4. Store                       MessageLog::insert_message              │
//! │                                                                         │
//! │  Recipient (Bob)                                                        │
//! │  ─────────────────────────────────────────────────────────────          │
//! │                                                                         │
//! │  history:  MessageLog::list_messages ──► decrypt each record            │
//! │  live:     MessageLog::subscribe     ──► filter recipient == Bob        │
//! │                                          ──► decrypt                    │
//! │                                                                         │
//! │  A record that fails to decrypt becomes MessageBody::Undecryptable      │
//! │  and renders as "[Failed to decrypt]". The rest of the history is       │
//! │  unaffected.                                                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Messages are encrypted to the recipient's key only. The sender keeps
//! no readable copy, so a user's own outgoing entries in a conversation
//! are undecryptable for them.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};

use crate::crypto::{encrypt_message_with_rng, PublicKeyHandle};
use crate::error::{Error, Result};
use crate::identity::Session;
use crate::storage::{MessageLog, MessageRecord, UserDirectory, UserRecord};

/// Text shown in place of a message that could not be decrypted
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[Failed to decrypt]";

/// Another user the session can chat with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    /// Directory ID
    pub id: String,
    /// Login name
    pub username: String,
    /// Display name
    pub display_name: String,
}

impl From<UserRecord> for Contact {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            display_name: record.display_name,
        }
    }
}

/// Decrypted content of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum MessageBody {
    /// Successfully decrypted text
    Text(String),
    /// Not addressed to this session's key, or corrupt
    Undecryptable,
}

impl MessageBody {
    /// The decrypted text, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageBody::Text(s) => Some(s),
            MessageBody::Undecryptable => None,
        }
    }
}

/// A message as seen by one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Record ID
    pub id: String,
    /// Sender's user ID
    pub sender_id: String,
    /// Recipient's user ID
    pub recipient_id: String,
    /// Unix timestamp (milliseconds)
    pub created_at: i64,
    /// Decrypted content
    pub body: MessageBody,
}

impl ChatMessage {
    /// Decrypt a stored record with the session's key
    fn open(record: MessageRecord, session: &Session) -> Self {
        let body = match session.decrypt(&record.ciphertext) {
            Ok(text) => MessageBody::Text(text),
            Err(e) => {
                if record.sender_id == session.id() && record.recipient_id != session.id() {
                    // Encrypted to the peer only; expected
                    tracing::trace!(
                        message_id = %record.id,
                        "Own outgoing message is not readable"
                    );
                } else {
                    tracing::warn!(
                        message_id = %record.id,
                        error = %e,
                        "Failed to decrypt message"
                    );
                }
                MessageBody::Undecryptable
            }
        };

        Self {
            id: record.id,
            sender_id: record.sender_id,
            recipient_id: record.recipient_id,
            created_at: record.created_at,
            body,
        }
    }

    /// Check if this message was sent by the given user
    pub fn is_outgoing(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }

    /// Text for display, with the placeholder for undecryptable messages
    pub fn display_text(&self) -> &str {
        self.body.as_text().unwrap_or(UNDECRYPTABLE_PLACEHOLDER)
    }
}

/// Messaging service over the user directory and message log
pub struct MessagingService {
    users: Arc<dyn UserDirectory>,
    messages: Arc<dyn MessageLog>,
    /// Imported recipient keys by user ID
    recipient_keys: RwLock<HashMap<String, Arc<PublicKeyHandle>>>,
}

impl MessagingService {
    /// Create a new messaging service
    pub fn new(users: Arc<dyn UserDirectory>, messages: Arc<dyn MessageLog>) -> Self {
        Self {
            users,
            messages,
            recipient_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Everyone the session user can message
    pub fn contacts(&self, session: &Session) -> Result<Vec<Contact>> {
        ensure_active(session)?;
        Ok(self
            .users
            .list_users()?
            .into_iter()
            .filter(|u| u.id != session.id())
            .map(Contact::from)
            .collect())
    }

    /// Encrypt `text` to the recipient and store it
    ///
    /// ## Errors
    ///
    /// - `NoSession` if the session was logged out or replaced
    /// - `InvalidInput` for empty or whitespace-only text
    /// - `UserNotFound` if the recipient does not exist
    /// - `MessageTooLarge` if the text exceeds the recipient key's limit
    pub fn send_text(
        &self,
        session: &Session,
        recipient_id: &str,
        text: &str,
    ) -> Result<MessageRecord> {
        self.send_text_with_rng(&mut OsRng, session, recipient_id, text)
    }

    /// Like [`send_text`](Self::send_text), drawing the OAEP seed from `rng`
    pub fn send_text_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        session: &Session,
        recipient_id: &str,
        text: &str,
    ) -> Result<MessageRecord> {
        ensure_active(session)?;
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("message must not be empty".into()));
        }

        let recipient_key = self.recipient_key(recipient_id)?;
        let ciphertext = encrypt_message_with_rng(rng, text, &recipient_key)?;
        let record = self
            .messages
            .insert_message(session.id(), recipient_id, &ciphertext)?;

        tracing::info!(
            message_id = %record.id,
            sender = session.id(),
            recipient = recipient_id,
            "Sent message"
        );
        Ok(record)
    }

    /// Chronological history with a peer, decrypted record by record
    pub fn conversation(&self, session: &Session, peer_id: &str) -> Result<Vec<ChatMessage>> {
        ensure_active(session)?;
        let records = self.messages.list_messages(session.id(), peer_id)?;
        Ok(records
            .into_iter()
            .map(|record| ChatMessage::open(record, session))
            .collect())
    }

    /// Like [`conversation`](Self::conversation), decrypting records in
    /// parallel on the blocking pool
    ///
    /// Order matches the log.
    pub async fn conversation_concurrent(
        &self,
        session: &Session,
        peer_id: &str,
    ) -> Result<Vec<ChatMessage>> {
        ensure_active(session)?;
        let records = self.messages.list_messages(session.id(), peer_id)?;

        let tasks = records.into_iter().map(|record| {
            let session = session.clone();
            tokio::task::spawn_blocking(move || ChatMessage::open(record, &session))
        });

        join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.map_err(Error::from))
            .collect()
    }

    /// Live feed of messages addressed to the session user
    ///
    /// With `peer` set, only messages from that user are yielded. Only
    /// records inserted after this call are delivered.
    pub fn inbox(&self, session: &Session, peer: Option<String>) -> Inbox {
        Inbox {
            session: session.clone(),
            peer,
            feed: self.messages.subscribe(),
        }
    }

    fn recipient_key(&self, recipient_id: &str) -> Result<Arc<PublicKeyHandle>> {
        if let Some(key) = self.recipient_keys.read().get(recipient_id) {
            return Ok(key.clone());
        }

        let record = self
            .users
            .get_user_by_id(recipient_id)?
            .ok_or(Error::UserNotFound)?;
        let key = Arc::new(PublicKeyHandle::import(&record.public_key)?);
        let fingerprint = key.fingerprint()?;

        tracing::debug!(recipient = recipient_id, %fingerprint, "Cached recipient key");
        self.recipient_keys
            .write()
            .insert(recipient_id.to_string(), key.clone());

        Ok(key)
    }
}

fn ensure_active(session: &Session) -> Result<()> {
    if session.is_active() {
        Ok(())
    } else {
        Err(Error::NoSession)
    }
}

/// Subscription to incoming messages for one session
pub struct Inbox {
    session: Session,
    peer: Option<String>,
    feed: broadcast::Receiver<MessageRecord>,
}

impl Inbox {
    /// Wait for the next matching message
    ///
    /// Returns `None` once the message log is gone or the session has been
    /// logged out.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        loop {
            if !self.session.is_active() {
                return None;
            }
            match self.feed.recv().await {
                Ok(record) => {
                    if !self.session.is_active() {
                        return None;
                    }
                    if self.accepts(&record) {
                        return Some(ChatMessage::open(record, &self.session));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Inbox lagged; reload the conversation");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn accepts(&self, record: &MessageRecord) -> bool {
        if record.recipient_id != self.session.id() {
            return false;
        }
        match &self.peer {
            Some(peer) => record.sender_id == *peer,
            None => true,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

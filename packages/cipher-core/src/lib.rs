//! # Cipher Core
//!
//! Client-side cryptography for an end-to-end encrypted chat: password
//! protected identity keys, per-message public-key encryption, and the
//! register/login/session flows that tie them to external storage.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CIPHER CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────────┐   ┌──────────────────────────────┐    │
//! │  │          Identity            │   │          Messaging           │    │
//! │  │                              │   │                              │    │
//! │  │ - register / login           │   │ - contacts                   │    │
//! │  │ - current session            │   │ - send_text                  │    │
//! │  │ - logout                     │   │ - conversation / inbox       │    │
//! │  └──────────────┬───────────────┘   └──────────────┬───────────────┘    │
//! │                 │                                  │                    │
//! │                 └────────────────┬─────────────────┘                    │
//! │                                  │                                      │
//! │  ┌───────────────────────────────┴──┐   ┌──────────────────────────┐    │
//! │  │             Crypto               │   │         Storage          │    │
//! │  │                                  │   │                          │    │
//! │  │ - Codec (base64)                 │   │ - UserDirectory          │    │
//! │  │ - PBKDF2-HMAC-SHA256             │   │ - MessageLog             │    │
//! │  │ - Vault (AES-256-GCM)            │   │ - DeviceStore            │    │
//! │  │ - RSA-OAEP keys and messages     │   │ - in-memory backends     │    │
//! │  └──────────────────────────────────┘   └──────────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Runtime configuration
//! - [`crypto`] - Cryptographic primitives (codec, KDF, vault, keys, messages)
//! - [`identity`] - Registration, login and sessions
//! - [`messaging`] - Encrypted one-to-one chat
//! - [`storage`] - Collaborator traits and in-memory implementations
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Layer 1: Message Encryption (RSA-2048 OAEP, SHA-256)                   │
//! │  ─────────────────────────────────────────────────────                  │
//! │  Every message is encrypted independently to the recipient's public     │
//! │  key. The server only ever stores ciphertext.                           │
//! │                                                                         │
//! │  Layer 2: Private Key at Rest (PBKDF2 + AES-256-GCM)                    │
//! │  ─────────────────────────────────────────────────                      │
//! │  The private key is stored server-side only after wrapping under a      │
//! │  key derived from the user's password with a fresh salt and nonce.      │
//! │                                                                         │
//! │  Layer 3: Session Key Residency                                         │
//! │  ──────────────────────────────                                         │
//! │  The unwrapped key lives in process memory and is zeroized on drop.     │
//! │  Device persistence of the unwrapped key is opt-in.                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod messaging;
pub mod storage;
/// Time utilities.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::{CoreConfig, KeyResidency};
pub use crypto::{KeyManager, KeyPair, PrivateKeyHandle, PublicKeyHandle, Vault, WrappedSecret};
pub use error::{Error, Result};
pub use identity::{IdentityService, Session};
pub use messaging::{ChatMessage, Contact, Inbox, MessageBody, MessagingService};

// ============================================================================
// CORE INSTANCE
// ============================================================================

use std::sync::Arc;

use storage::{
    DeviceStore, MemoryMessageLog, MemorySecureStore, MemoryUserDirectory, MessageLog,
    UserDirectory,
};

/// Identity and messaging services over one set of collaborators
///
/// ## Lifecycle
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                        CIPHER CORE LIFECYCLE                            │
/// ├─────────────────────────────────────────────────────────────────────────┤
/// │                                                                         │
/// │  1. Construct                                                           │
/// │     ┌─────────────┐                                                     │
/// │     │ CipherCore::│──► Validate config                                  │
/// │     │ new()       │──► Wire UserDirectory / MessageLog / DeviceStore    │
/// │     └─────────────┘                                                     │
/// │            │                                                            │
/// │            ▼                                                            │
/// │  2. Resume or Authenticate                                              │
/// │     ┌─────────────┐                                                     │
/// │     │ identity()  │──► current_session()                                │
/// │     │             │──► or register() / login()                          │
/// │     └─────────────┘                                                     │
/// │            │                                                            │
/// │            ▼                                                            │
/// │  3. Chat                                                                │
/// │     ┌─────────────┐                                                     │
/// │     │ messaging() │◄─► send_text / conversation / inbox                 │
/// │     └─────────────┘                                                     │
/// │            │                                                            │
/// │            ▼                                                            │
/// │  4. logout()    ──► key dropped, device entries removed                 │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub struct CipherCore {
    config: CoreConfig,
    identity: IdentityService,
    messaging: MessagingService,
}

impl CipherCore {
    /// Build the services over the given collaborators
    pub fn new(
        config: CoreConfig,
        users: Arc<dyn UserDirectory>,
        messages: Arc<dyn MessageLog>,
        device: Arc<dyn DeviceStore>,
    ) -> Result<Self> {
        tracing::info!("Initializing Cipher Core v{}", version());

        let identity = IdentityService::new(&config, users.clone(), device)?;
        let messaging = MessagingService::new(users, messages);

        Ok(Self {
            config,
            identity,
            messaging,
        })
    }

    /// Build the services over fresh in-memory collaborators
    pub fn in_memory(config: CoreConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemoryMessageLog::new()),
            Arc::new(MemorySecureStore::new()),
        )
    }

    /// Active configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Registration, login and sessions
    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }

    /// Encrypted chat
    pub fn messaging(&self) -> &MessagingService {
        &self.messaging
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Cipher Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfParams;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CoreConfig {
            rsa_key_bits: 1024,
            ..CoreConfig::default()
        };
        assert!(matches!(
            CipherCore::in_memory(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_facade_round_trip() {
        let core = CipherCore::in_memory(CoreConfig {
            kdf: KdfParams { iterations: 10_000 },
            ..CoreConfig::default()
        })
        .unwrap();

        let alice = core.identity().register("alice", "Alice", "pw-a").unwrap();
        let bob = core.identity().register("bob", "Bob", "pw-b").unwrap();

        // Registering bob replaced alice as the device's session
        let current = core.identity().require_session().unwrap();
        assert_eq!(current.id(), bob.id());

        core.messaging().send_text(&bob, alice.id(), "hey").unwrap();

        core.identity().logout();
        let alice = core.identity().login("alice", "pw-a").unwrap();
        let history = core.messaging().conversation(&alice, bob.id()).unwrap();
        assert_eq!(history[0].display_text(), "hey");
        assert_eq!(core.config().kdf.iterations, 10_000);
    }
}

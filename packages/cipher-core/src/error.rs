//! # Error Handling
//!
//! This module provides the error types for Cipher Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                      │
//! │  │                                                                      │
//! │  ├── Config Errors                                                      │
//! │  │   └── InvalidConfig         - Rejected tunable                       │
//! │  │                                                                      │
//! │  ├── Identity Errors (user-facing)                                      │
//! │  │   ├── UsernameTaken         - Registration conflict                  │
//! │  │   ├── UserNotFound          - No such user                           │
//! │  │   ├── InvalidPassword       - Login could not unwrap the key         │
//! │  │   ├── NoSession             - Operation needs a logged-in user       │
//! │  │   └── InvalidInput          - Empty username/password/message        │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                      │
//! │  │   ├── DecodeError           - Malformed base64                       │
//! │  │   ├── MalformedKeyMaterial  - Bad SPKI/PKCS#8 import                 │
//! │  │   ├── WrongPasswordOrCorrupt- Vault tag did not verify               │
//! │  │   ├── MessageTooLarge       - Plaintext exceeds the OAEP ceiling     │
//! │  │   ├── DecryptionFailed      - One message could not be opened        │
//! │  │   ├── EncryptionFailed      - Primitive refused to encrypt           │
//! │  │   ├── KeyGenerationFailed   - RSA key generation failed              │
//! │  │   └── KeyDerivationFailed   - PBKDF2 could not run                   │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                     │
//! │  │   ├── StorageReadError                                               │
//! │  │   └── StorageWriteError                                              │
//! │  │                                                                      │
//! │  └── Internal Errors                                                    │
//! │      ├── SerializationError                                             │
//! │      └── Internal              - Task join failures, invariants         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `WrongPasswordOrCorrupt` deliberately covers both a wrong password and a
//! damaged blob. AES-GCM only tells us the tag failed, and surfacing anything
//! finer would hand an attacker an oracle.

use thiserror::Error;

/// Result type alias for Cipher Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Cipher Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Config Errors (100-199)
    // ========================================================================

    /// A configuration value was rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Identity Errors (200-299)
    // ========================================================================

    /// Registration hit an existing username
    #[error("Username already taken")]
    UsernameTaken,

    /// No user record exists for the lookup
    #[error("User not found")]
    UserNotFound,

    /// The password did not unwrap the stored private key
    #[error("Invalid password")]
    InvalidPassword,

    /// No active session
    #[error("No active session. Log in or register first.")]
    NoSession,

    /// Caller supplied an unusable value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// Text was not valid base64
    #[error("Malformed encoding: {0}")]
    DecodeError(String),

    /// Key bytes could not be imported
    #[error("Malformed key material: {0}")]
    MalformedKeyMaterial(String),

    /// The vault authentication tag did not verify
    #[error("Wrong password or corrupted data")]
    WrongPasswordOrCorrupt,

    /// Plaintext is longer than the recipient key can carry
    #[error("Message too large: {len} bytes (max {max})")]
    MessageTooLarge {
        /// Plaintext length in bytes
        len: usize,
        /// Largest plaintext the recipient key accepts
        max: usize,
    },

    /// A ciphertext could not be decrypted with this key
    #[error("Failed to decrypt message")]
    DecryptionFailed,

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Key pair generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Password key derivation failed
    #[error("Failed to derive key: {0}")]
    KeyDerivationFailed(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Failed to read from a storage collaborator
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to a storage collaborator
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Config
    /// - 200-299: Identity
    /// - 300-399: Crypto
    /// - 400-499: Storage
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Config (100-199)
            Error::InvalidConfig(_) => 100,

            // Identity (200-299)
            Error::UsernameTaken => 200,
            Error::UserNotFound => 201,
            Error::InvalidPassword => 202,
            Error::NoSession => 203,
            Error::InvalidInput(_) => 204,

            // Crypto (300-399)
            Error::DecodeError(_) => 300,
            Error::MalformedKeyMaterial(_) => 301,
            Error::WrongPasswordOrCorrupt => 302,
            Error::MessageTooLarge { .. } => 303,
            Error::DecryptionFailed => 304,
            Error::EncryptionFailed(_) => 305,
            Error::KeyGenerationFailed(_) => 306,
            Error::KeyDerivationFailed(_) => 307,

            // Storage (400-499)
            Error::StorageReadError(_) => 400,
            Error::StorageWriteError(_) => 401,

            // Internal (900-999)
            Error::Internal(_) => 900,
            Error::SerializationError(_) => 901,
        }
    }

    /// Check if this error is meant to be shown to the user as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::UsernameTaken
                | Error::UserNotFound
                | Error::InvalidPassword
                | Error::NoSession
                | Error::InvalidInput(_)
                | Error::MessageTooLarge { .. }
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::DecodeError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Background task failed: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidConfig("test".into()).code(), 100);
        assert_eq!(Error::UsernameTaken.code(), 200);
        assert_eq!(Error::DecodeError("test".into()).code(), 300);
        assert_eq!(Error::StorageReadError("test".into()).code(), 400);
        assert_eq!(Error::Internal("test".into()).code(), 900);
    }

    #[test]
    fn test_user_facing_errors() {
        assert!(Error::InvalidPassword.is_user_facing());
        assert!(Error::UserNotFound.is_user_facing());
        assert!(Error::MessageTooLarge { len: 191, max: 190 }.is_user_facing());
        assert!(!Error::WrongPasswordOrCorrupt.is_user_facing());
        assert!(!Error::Internal("test".into()).is_user_facing());
    }

    #[test]
    fn test_password_errors_do_not_leak_detail() {
        assert_eq!(Error::InvalidPassword.to_string(), "Invalid password");
        assert_eq!(
            Error::WrongPasswordOrCorrupt.to_string(),
            "Wrong password or corrupted data"
        );
    }

    #[test]
    fn test_message_too_large_display() {
        let err = Error::MessageTooLarge { len: 200, max: 190 };
        assert!(err.to_string().contains("200"));
        assert!(err.to_string().contains("190"));
    }
}

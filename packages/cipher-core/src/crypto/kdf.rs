//! # Password Key Derivation
//!
//! Turns a human password plus a random salt into the AES-256-GCM key that
//! wraps the private key at rest.
//!
//! ## Derivation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     PASSWORD KEY DERIVATION                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   password (UTF-8)      salt (16 random bytes, stored with the blob)    │
//! │        │                        │                                       │
//! │        └──────────┬─────────────┘                                       │
//! │                   ▼                                                     │
//! │        PBKDF2-HMAC-SHA256 × iterations (default 100 000)                │
//! │                   │                                                     │
//! │                   ▼                                                     │
//! │        256-bit SymmetricKey  ──► AES-256-GCM only                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Considerations
//!
//! | Aspect | Design Choice | Rationale |
//! |--------|---------------|-----------|
//! | KDF Algorithm | PBKDF2-HMAC-SHA256 | Matches already-stored records |
//! | Iterations | `KdfParams::iterations` | Tunable; raise as hardware improves |
//! | Salt | 16 random bytes per wrap | No precomputation across users |
//! | Output | Zeroized on drop | Key never outlives the operation |
//!
//! The baseline wrapped format does not record the iteration count, so a
//! record can only be unwrapped with the count it was wrapped with.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};

/// Size of the PBKDF2 salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of the derived key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Iteration count used when nothing else is configured
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Tunable PBKDF2 parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// PBKDF2 iteration count
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// A 256-bit key derived from a password
///
/// Only usable for the vault's AEAD. Zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Raw key bytes, for handing to the AEAD
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Derive the wrapping key for `password` and `salt`
///
/// Deterministic: the same inputs always give the same key, which is what
/// lets `unwrap` re-derive it later from the salt stored in the blob.
pub fn derive_key(
    password: &str,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> Result<SymmetricKey> {
    if params.iterations == 0 {
        return Err(Error::KeyDerivationFailed(
            "iteration count must be non-zero".into(),
        ));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, params.iterations, &mut key);

    Ok(SymmetricKey(key))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> KdfParams {
        KdfParams { iterations: 1_000 }
    }

    #[test]
    fn test_derive_deterministic() {
        let salt = [7u8; SALT_SIZE];

        let key1 = derive_key("correct-horse", &salt, &fast()).unwrap();
        let key2 = derive_key("correct-horse", &salt, &fast()).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_passwords_different_keys() {
        let salt = [7u8; SALT_SIZE];

        let key1 = derive_key("correct-horse", &salt, &fast()).unwrap();
        let key2 = derive_key("battery-staple", &salt, &fast()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_salts_different_keys() {
        let key1 = derive_key("correct-horse", &[1u8; SALT_SIZE], &fast()).unwrap();
        let key2 = derive_key("correct-horse", &[2u8; SALT_SIZE], &fast()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_iterations_change_key() {
        let salt = [7u8; SALT_SIZE];

        let key1 = derive_key("pw", &salt, &KdfParams { iterations: 1_000 }).unwrap();
        let key2 = derive_key("pw", &salt, &KdfParams { iterations: 1_001 }).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let result = derive_key("pw", &[0u8; SALT_SIZE], &KdfParams { iterations: 0 });
        assert!(matches!(result, Err(Error::KeyDerivationFailed(_))));
    }

    #[test]
    fn test_default_iterations() {
        assert_eq!(KdfParams::default().iterations, 100_000);
    }

    #[test]
    fn test_debug_redacts() {
        let key = derive_key("pw", &[0u8; SALT_SIZE], &fast()).unwrap();
        assert_eq!(format!("{:?}", key), "SymmetricKey(<redacted>)");
    }
}

//! # Symmetric Vault
//!
//! Password-protects an opaque secret (the exported private key) for storage.
//!
//! ## Wrapped Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         WRAPPED SECRET                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   base64( salt ‖ nonce ‖ ciphertext ‖ tag )                             │
//! │                                                                         │
//! │   ┌──────────┬──────────┬───────────────────────────┬──────────┐        │
//! │   │ salt     │ nonce    │ AES-256-GCM ciphertext    │ GCM tag  │        │
//! │   │ 16 bytes │ 12 bytes │ len(secret) bytes         │ 16 bytes │        │
//! │   └──────────┴──────────┴───────────────────────────┴──────────┘        │
//! │    0        16         28                                               │
//! │                                                                         │
//! │   key = PBKDF2-HMAC-SHA256(password, salt)      AAD = empty             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Critical Security Requirement
//!
//! Salt and nonce are drawn fresh from a CSPRNG on every `wrap`, even when
//! re-wrapping the same secret under the same password. Nonce reuse under
//! one key breaks AES-GCM outright.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use super::codec;
use super::kdf::{derive_key, KdfParams, SALT_SIZE};
use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Bytes preceding the ciphertext in a wrapped blob
const HEADER_SIZE: usize = SALT_SIZE + NONCE_SIZE;

/// A password-wrapped secret
///
/// Self-contained: carries everything except the password needed to
/// recover the secret. Safe to store as a single text blob via
/// [`WrappedSecret::to_text`].
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedSecret {
    salt: [u8; SALT_SIZE],
    nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the GCM tag appended
    ciphertext: Vec<u8>,
}

impl WrappedSecret {
    /// The PBKDF2 salt
    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    /// The AES-GCM nonce
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Ciphertext including the authentication tag
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialize as `salt ‖ nonce ‖ ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parse `salt ‖ nonce ‖ ciphertext`
    ///
    /// A blob too short to hold a tag can never authenticate, so it is
    /// reported the same way as a failed tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE + TAG_SIZE {
            return Err(Error::WrongPasswordOrCorrupt);
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[..SALT_SIZE]);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[SALT_SIZE..HEADER_SIZE]);

        Ok(Self {
            salt,
            nonce,
            ciphertext: bytes[HEADER_SIZE..].to_vec(),
        })
    }

    /// Encode for storage
    pub fn to_text(&self) -> String {
        codec::encode(&self.to_bytes())
    }

    /// Decode a stored blob
    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_bytes(&codec::decode(text)?)
    }
}

impl std::fmt::Debug for WrappedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedSecret")
            .field("salt", &hex::encode(self.salt))
            .field("nonce", &hex::encode(self.nonce))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// Wraps and unwraps secrets under password-derived keys
#[derive(Debug, Clone, Default)]
pub struct Vault {
    params: KdfParams,
}

impl Vault {
    /// Create a vault with the given derivation parameters
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// The derivation parameters in use
    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Wrap `secret` under `password` using the OS random source
    pub fn wrap(&self, secret: &[u8], password: &str) -> Result<WrappedSecret> {
        self.wrap_with_rng(&mut OsRng, secret, password)
    }

    /// Wrap `secret` under `password`, drawing salt and nonce from `rng`
    ///
    /// `rng` must be cryptographically secure outside of tests.
    pub fn wrap_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        secret: &[u8],
        password: &str,
    ) -> Result<WrappedSecret> {
        let mut salt = [0u8; SALT_SIZE];
        rng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut nonce);

        let key = derive_key(password, &salt, &self.params)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

        let payload = Payload {
            msg: secret,
            aad: &[],
        };

        let ciphertext = cipher
            .encrypt(AesNonce::from_slice(&nonce), payload)
            .map_err(|e| Error::EncryptionFailed(format!("Wrap failed: {}", e)))?;

        tracing::debug!(len = secret.len(), "Wrapped secret");

        Ok(WrappedSecret {
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Recover the secret from `wrapped`
    ///
    /// ## Errors
    ///
    /// Returns `WrongPasswordOrCorrupt` whenever the tag fails to verify.
    /// A wrong password and a damaged blob are indistinguishable here.
    pub fn unwrap(&self, wrapped: &WrappedSecret, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        let key = derive_key(password, &wrapped.salt, &self.params)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| Error::Internal(format!("Invalid key: {}", e)))?;

        let payload = Payload {
            msg: &wrapped.ciphertext,
            aad: &[],
        };

        cipher
            .decrypt(AesNonce::from_slice(&wrapped.nonce), payload)
            .map(Zeroizing::new)
            .map_err(|_| Error::WrongPasswordOrCorrupt)
    }

    /// Decode a stored text blob and unwrap it
    pub fn unwrap_text(&self, text: &str, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        let wrapped = WrappedSecret::from_text(text)?;
        self.unwrap(&wrapped, password)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn vault() -> Vault {
        Vault::new(KdfParams { iterations: 1_000 })
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let vault = vault();
        let wrapped = vault.wrap(b"private key bytes", "correct-horse").unwrap();
        let secret = vault.unwrap(&wrapped, "correct-horse").unwrap();

        assert_eq!(secret.as_slice(), b"private key bytes");
    }

    #[test]
    fn test_wrong_password_rejected() {
        let vault = vault();
        let wrapped = vault.wrap(b"private key bytes", "correct-horse").unwrap();

        let result = vault.unwrap(&wrapped, "battery-staple");
        assert!(matches!(result, Err(Error::WrongPasswordOrCorrupt)));
    }

    #[test]
    fn test_tampered_ciphertext_same_error_as_wrong_password() {
        let vault = vault();
        let wrapped = vault.wrap(b"private key bytes", "correct-horse").unwrap();

        let mut bytes = wrapped.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = WrappedSecret::from_bytes(&bytes).unwrap();

        let result = vault.unwrap(&tampered, "correct-horse");
        assert!(matches!(result, Err(Error::WrongPasswordOrCorrupt)));
    }

    #[test]
    fn test_tampered_salt_rejected() {
        let vault = vault();
        let wrapped = vault.wrap(b"secret", "pw").unwrap();

        let mut bytes = wrapped.to_bytes();
        bytes[0] ^= 0xFF;
        let tampered = WrappedSecret::from_bytes(&bytes).unwrap();

        assert!(matches!(
            vault.unwrap(&tampered, "pw"),
            Err(Error::WrongPasswordOrCorrupt)
        ));
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let short = vec![0u8; HEADER_SIZE + TAG_SIZE - 1];
        assert!(matches!(
            WrappedSecret::from_bytes(&short),
            Err(Error::WrongPasswordOrCorrupt)
        ));
    }

    #[test]
    fn test_malformed_text_is_decode_error() {
        let result = vault().unwrap_text("%%% not base64 %%%", "pw");
        assert!(matches!(result, Err(Error::DecodeError(_))));
    }

    #[test]
    fn test_layout() {
        let vault = vault();
        let wrapped = vault.wrap(b"0123456789", "pw").unwrap();
        let bytes = codec::decode(&wrapped.to_text()).unwrap();

        assert_eq!(bytes.len(), 16 + 12 + 10 + TAG_SIZE);
        assert_eq!(&bytes[0..16], wrapped.salt());
        assert_eq!(&bytes[16..28], wrapped.nonce());
        assert_eq!(&bytes[28..], wrapped.ciphertext());
    }

    #[test]
    fn test_text_round_trip() {
        let vault = vault();
        let text = vault.wrap(b"secret", "pw").unwrap().to_text();
        let secret = vault.unwrap_text(&text, "pw").unwrap();

        assert_eq!(secret.as_slice(), b"secret");
    }

    #[test]
    fn test_empty_secret() {
        let vault = vault();
        let wrapped = vault.wrap(b"", "pw").unwrap();
        assert!(vault.unwrap(&wrapped, "pw").unwrap().is_empty());
    }

    #[test]
    fn test_salt_and_nonce_fresh_per_wrap() {
        let vault = vault();
        let mut salts = HashSet::new();
        let mut nonces = HashSet::new();

        for _ in 0..64 {
            let wrapped = vault.wrap(b"same secret", "same password").unwrap();
            assert!(salts.insert(*wrapped.salt()), "salt reused");
            assert!(nonces.insert(*wrapped.nonce()), "nonce reused");
        }
    }

    #[test]
    fn test_injected_rng_is_deterministic() {
        let vault = vault();

        let a = vault
            .wrap_with_rng(&mut StdRng::seed_from_u64(42), b"secret", "pw")
            .unwrap();
        let b = vault
            .wrap_with_rng(&mut StdRng::seed_from_u64(42), b"secret", "pw")
            .unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_iteration_count_must_match() {
        let wrapped = vault().wrap(b"secret", "pw").unwrap();
        let other = Vault::new(KdfParams { iterations: 2_000 });

        assert!(matches!(
            other.unwrap(&wrapped, "pw"),
            Err(Error::WrongPasswordOrCorrupt)
        ));
    }

    #[test]
    fn test_debug_hides_ciphertext() {
        let wrapped = vault().wrap(b"secret", "pw").unwrap();
        let debug = format!("{:?}", wrapped);

        assert!(debug.contains("ciphertext_len"));
        assert!(!debug.contains("secret"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_vault_round_trip(
            secret in proptest::collection::vec(any::<u8>(), 0..256),
            password in ".{0,32}",
        ) {
            let vault = vault();
            let wrapped = vault.wrap(&secret, &password).unwrap();
            let unwrapped = vault.unwrap(&wrapped, &password).unwrap();
            prop_assert_eq!(unwrapped.as_slice(), secret.as_slice());
        }
    }
}

//! # Key Management
//!
//! This module handles generation, export and import of the long-term
//! RSA-OAEP key pair that every identity owns.
//!
//! ## Key Handles
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY HANDLES                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  PublicKeyHandle (encrypt-only)                                 │    │
//! │  │  ──────────────────────────────                                 │    │
//! │  │  • Shared freely, stored in the user directory                  │    │
//! │  │  • Exports as base64(SPKI DER)                                  │    │
//! │  │  • Can only encrypt; has no decrypt operation                   │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  PrivateKeyHandle (decrypt-only)                                │    │
//! │  │  ───────────────────────────────                                │    │
//! │  │  • Never stored unwrapped                                       │    │
//! │  │  • Exports as base64(PKCS#8 DER), for wrapping only             │    │
//! │  │  • Can only decrypt; cannot be exported as a public key         │    │
//! │  │  • Zeroized when dropped                                        │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The capability split is enforced by the types: there is no method that
//! turns a `PrivateKeyHandle` into a `PublicKeyHandle`, and no decrypt on a
//! public handle.

use std::time::Instant;

use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::codec;
use crate::error::{Error, Result};

/// Modulus size used when nothing else is configured
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Modulus sizes accepted for generation
pub const SUPPORTED_KEY_BITS: [usize; 3] = [2048, 3072, 4096];

/// Smallest modulus accepted on import
pub const MIN_KEY_BITS: usize = 2048;

/// OAEP padding with SHA-256 for both the label hash and MGF1
pub(crate) fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

// ============================================================================
// KEY PAIR
// ============================================================================

/// A freshly generated identity key pair
pub struct KeyPair {
    public: PublicKeyHandle,
    private: PrivateKeyHandle,
}

impl KeyPair {
    /// The encrypt-only half
    pub fn public(&self) -> &PublicKeyHandle {
        &self.public
    }

    /// The decrypt-only half
    pub fn private(&self) -> &PrivateKeyHandle {
        &self.private
    }

    /// Split into the two handles
    pub fn into_parts(self) -> (PublicKeyHandle, PrivateKeyHandle) {
        (self.public, self.private)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &self.private)
            .finish()
    }
}

// ============================================================================
// PUBLIC KEY
// ============================================================================

/// Encrypt-only RSA public key
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyHandle(RsaPublicKey);

impl PublicKeyHandle {
    /// Import from base64(SPKI DER)
    ///
    /// Fails with `MalformedKeyMaterial` for bad base64, bad DER, a
    /// non-RSA key, or a modulus below [`MIN_KEY_BITS`].
    pub fn import(text: &str) -> Result<Self> {
        let der = codec::decode(text)
            .map_err(|e| Error::MalformedKeyMaterial(format!("public key: {}", e)))?;
        let key = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| Error::MalformedKeyMaterial(format!("public key: {}", e)))?;

        check_modulus(key.size())?;
        Ok(Self(key))
    }

    /// Export as base64(SPKI DER)
    pub fn export(&self) -> Result<String> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| Error::SerializationError(format!("public key: {}", e)))?;
        Ok(codec::encode(der.as_bytes()))
    }

    /// Modulus size in bits
    pub fn modulus_bits(&self) -> usize {
        self.0.size() * 8
    }

    /// Modulus size in bytes
    pub(crate) fn modulus_bytes(&self) -> usize {
        self.0.size()
    }

    /// Short fingerprint for out-of-band verification
    ///
    /// First 16 bytes of SHA-256 over the SPKI DER, hex encoded.
    pub fn fingerprint(&self) -> Result<String> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| Error::SerializationError(format!("public key: {}", e)))?;
        let digest = Sha256::digest(der.as_bytes());
        Ok(hex::encode(&digest[..16]))
    }

    /// OAEP-encrypt raw bytes; callers enforce the size ceiling first
    pub(crate) fn encrypt<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        self.0
            .encrypt(rng, oaep(), data)
            .map_err(|e| Error::EncryptionFailed(e.to_string()))
    }
}

impl std::fmt::Debug for PublicKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKeyHandle")
            .field("bits", &self.modulus_bits())
            .finish()
    }
}

// ============================================================================
// PRIVATE KEY
// ============================================================================

/// Decrypt-only RSA private key
///
/// Not `Clone`: share it behind an `Arc` so there is exactly one copy of
/// the key material to zeroize.
pub struct PrivateKeyHandle(RsaPrivateKey);

impl PrivateKeyHandle {
    /// Import from base64(PKCS#8 DER)
    pub fn import(text: &str) -> Result<Self> {
        let der = Zeroizing::new(
            codec::decode(text).map_err(|_| {
                Error::MalformedKeyMaterial("private key: invalid encoding".into())
            })?,
        );
        let key = RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| Error::MalformedKeyMaterial(format!("private key: {}", e)))?;
        key.validate()
            .map_err(|e| Error::MalformedKeyMaterial(format!("private key: {}", e)))?;

        check_modulus(key.size())?;
        Ok(Self(key))
    }

    /// Export as base64(PKCS#8 DER)
    ///
    /// ## Security Warning
    ///
    /// Only for wrapping with the vault or for device-local residency.
    /// Never log or persist this text unwrapped.
    pub fn export(&self) -> Result<Zeroizing<String>> {
        let der = self
            .0
            .to_pkcs8_der()
            .map_err(|e| Error::SerializationError(format!("private key: {}", e)))?;
        Ok(Zeroizing::new(codec::encode(der.as_bytes())))
    }

    /// Modulus size in bits
    pub fn modulus_bits(&self) -> usize {
        self.0.size() * 8
    }

    /// OAEP-decrypt with blinding
    pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.0
            .decrypt_blinded(&mut OsRng, oaep(), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| Error::DecryptionFailed)
    }
}

impl std::fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKeyHandle(<redacted>)")
    }
}

fn check_modulus(size_bytes: usize) -> Result<()> {
    let bits = size_bytes * 8;
    if bits < MIN_KEY_BITS {
        return Err(Error::MalformedKeyMaterial(format!(
            "RSA modulus of {} bits is below the {} bit minimum",
            bits, MIN_KEY_BITS
        )));
    }
    Ok(())
}

// ============================================================================
// KEY MANAGER
// ============================================================================

/// Generates identity key pairs at a configured modulus size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyManager {
    bits: usize,
}

impl Default for KeyManager {
    fn default() -> Self {
        Self {
            bits: DEFAULT_KEY_BITS,
        }
    }
}

impl KeyManager {
    /// Create a key manager for one of [`SUPPORTED_KEY_BITS`]
    pub fn new(bits: usize) -> Result<Self> {
        if !SUPPORTED_KEY_BITS.contains(&bits) {
            return Err(Error::InvalidConfig(format!(
                "unsupported RSA key size {} (expected one of {:?})",
                bits, SUPPORTED_KEY_BITS
            )));
        }
        Ok(Self { bits })
    }

    /// Configured modulus size
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Generate a key pair using the OS random source
    ///
    /// This is the heaviest operation in the crate (hundreds of
    /// milliseconds); see [`KeyManager::generate_off_thread`].
    pub fn generate(&self) -> Result<KeyPair> {
        self.generate_with_rng(&mut OsRng)
    }

    /// Generate a key pair drawing randomness from `rng`
    pub fn generate_with_rng<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<KeyPair> {
        let started = Instant::now();

        let private = RsaPrivateKey::new(rng, self.bits)
            .map_err(|e| Error::KeyGenerationFailed(e.to_string()))?;
        let public = RsaPublicKey::from(&private);

        tracing::debug!(
            bits = self.bits,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated key pair"
        );

        Ok(KeyPair {
            public: PublicKeyHandle(public),
            private: PrivateKeyHandle(private),
        })
    }

    /// Generate on tokio's blocking pool
    ///
    /// Dropping the returned future abandons the result; nothing needs to
    /// be rolled back.
    pub async fn generate_off_thread(&self) -> Result<KeyPair> {
        let manager = *self;
        tokio::task::spawn_blocking(move || manager.generate()).await?
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::fixtures::{ALICE, BOB};

    #[test]
    fn test_generated_size() {
        assert_eq!(ALICE.public().modulus_bits(), 2048);
        assert_eq!(ALICE.private().modulus_bits(), 2048);
    }

    #[test]
    fn test_public_export_import_round_trip() {
        let text = ALICE.public().export().unwrap();
        let imported = PublicKeyHandle::import(&text).unwrap();

        assert_eq!(&imported, ALICE.public());
        assert_eq!(imported.export().unwrap(), text);
    }

    #[test]
    fn test_private_export_import_round_trip() {
        let text = ALICE.private().export().unwrap();
        let imported = PrivateKeyHandle::import(&text).unwrap();

        let ciphertext = ALICE.public().encrypt(&mut OsRng, b"hello").unwrap();
        let plaintext = imported.decrypt(&ciphertext).unwrap();

        assert_eq!(plaintext.as_slice(), b"hello");
    }

    #[test]
    fn test_import_garbage_rejected() {
        assert!(matches!(
            PublicKeyHandle::import("aGVsbG8="),
            Err(Error::MalformedKeyMaterial(_))
        ));
        assert!(matches!(
            PrivateKeyHandle::import("aGVsbG8="),
            Err(Error::MalformedKeyMaterial(_))
        ));
    }

    #[test]
    fn test_import_bad_encoding_rejected() {
        assert!(matches!(
            PublicKeyHandle::import("***"),
            Err(Error::MalformedKeyMaterial(_))
        ));
        assert!(matches!(
            PrivateKeyHandle::import("***"),
            Err(Error::MalformedKeyMaterial(_))
        ));
    }

    #[test]
    fn test_public_text_is_not_a_private_key() {
        let public_text = ALICE.public().export().unwrap();
        assert!(matches!(
            PrivateKeyHandle::import(&public_text),
            Err(Error::MalformedKeyMaterial(_))
        ));
    }

    #[test]
    fn test_private_text_is_not_a_public_key() {
        let private_text = ALICE.private().export().unwrap();
        assert!(matches!(
            PublicKeyHandle::import(&private_text),
            Err(Error::MalformedKeyMaterial(_))
        ));
    }

    #[test]
    fn test_small_modulus_rejected() {
        let small = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let der = RsaPublicKey::from(&small).to_public_key_der().unwrap();

        let result = PublicKeyHandle::import(&codec::encode(der.as_bytes()));
        assert!(matches!(result, Err(Error::MalformedKeyMaterial(_))));
    }

    #[test]
    fn test_unsupported_bits_rejected() {
        assert!(matches!(KeyManager::new(1024), Err(Error::InvalidConfig(_))));
        assert!(KeyManager::new(3072).is_ok());
        assert_eq!(KeyManager::default().bits(), 2048);
    }

    #[test]
    fn test_fingerprint() {
        let alice = ALICE.public().fingerprint().unwrap();
        let again = ALICE.public().fingerprint().unwrap();
        let bob = BOB.public().fingerprint().unwrap();

        assert_eq!(alice.len(), 32);
        assert_eq!(alice, again);
        assert_ne!(alice, bob);
    }

    #[test]
    fn test_wrong_key_cannot_decrypt() {
        let ciphertext = ALICE.public().encrypt(&mut OsRng, b"for alice").unwrap();
        assert!(matches!(
            BOB.private().decrypt(&ciphertext),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn test_debug_redacts_private() {
        assert_eq!(
            format!("{:?}", ALICE.private()),
            "PrivateKeyHandle(<redacted>)"
        );
    }

    #[tokio::test]
    async fn test_generate_off_thread() {
        let pair = KeyManager::default().generate_off_thread().await.unwrap();
        assert_eq!(pair.public().modulus_bits(), 2048);
    }
}

//! # Message Cipher
//!
//! Per-message RSA-OAEP (SHA-256) encryption of chat text.
//!
//! ## Message Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MESSAGE ENCRYPTION                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Sender                                          Recipient              │
//! │  ──────                                          ─────────              │
//! │  "hello" (UTF-8)                                                        │
//! │     │                                                                   │
//! │     ├──► len ≤ k − 66 ?  no ──► MessageTooLarge                         │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  OAEP-SHA256(recipient public key, fresh random seed)                   │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  base64 ciphertext ──── storage / transport ────► OAEP decrypt          │
//! │                                                   with own private key  │
//! │                                                         │               │
//! │                                                         ▼               │
//! │                                                      "hello"            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every message is one independent public-key operation. There is no
//! session key and no state carried between messages, which bounds the
//! plaintext to 190 bytes for a 2048-bit key.

use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};

use super::codec;
use super::keys::{PrivateKeyHandle, PublicKeyHandle};
use crate::error::{Error, Result};

/// OAEP overhead for SHA-256: two digests plus two bytes
pub const OAEP_SHA256_OVERHEAD: usize = 2 * 32 + 2;

/// Largest plaintext (in UTF-8 bytes) `recipient` can receive
pub fn max_plaintext_len(recipient: &PublicKeyHandle) -> usize {
    recipient
        .modulus_bytes()
        .saturating_sub(OAEP_SHA256_OVERHEAD)
}

/// Encrypt `plaintext` for `recipient` using the OS random source
pub fn encrypt_message(plaintext: &str, recipient: &PublicKeyHandle) -> Result<String> {
    encrypt_message_with_rng(&mut OsRng, plaintext, recipient)
}

/// Encrypt `plaintext` for `recipient`, drawing the OAEP seed from `rng`
///
/// ## Errors
///
/// `MessageTooLarge` when the UTF-8 plaintext exceeds
/// [`max_plaintext_len`]; it is checked before touching the primitive.
pub fn encrypt_message_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    plaintext: &str,
    recipient: &PublicKeyHandle,
) -> Result<String> {
    let max = max_plaintext_len(recipient);
    let len = plaintext.len();
    if len > max {
        return Err(Error::MessageTooLarge { len, max });
    }

    let ciphertext = recipient.encrypt(rng, plaintext.as_bytes())?;
    Ok(codec::encode(&ciphertext))
}

/// Decrypt a base64 ciphertext with our own private key
///
/// Anything that is not a valid OAEP ciphertext for this key, including
/// bad base64 and non-UTF-8 plaintext, is `DecryptionFailed`.
pub fn decrypt_message(ciphertext: &str, own_key: &PrivateKeyHandle) -> Result<String> {
    let bytes = codec::decode(ciphertext).map_err(|_| Error::DecryptionFailed)?;
    let plaintext = own_key.decrypt(&bytes)?;

    String::from_utf8(plaintext.to_vec()).map_err(|_| Error::DecryptionFailed)
}

// ============================================================================
// TESTS
// ============================================================================

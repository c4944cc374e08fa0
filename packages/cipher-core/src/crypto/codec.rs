//! # Codec
//!
//! Base64 (standard alphabet, padded) transport encoding for opaque byte
//! blobs: exported keys, wrapped secrets and message ciphertexts all cross
//! the storage boundary as text produced here.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::Result;

/// Encode bytes as padded standard base64
pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode padded standard base64
///
/// Fails with `DecodeError` on characters outside the alphabet or
/// non-canonical padding.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(text)?)
}

// ============================================================================
// TESTS
// ============================================================================

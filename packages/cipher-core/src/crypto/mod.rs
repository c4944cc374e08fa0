//! # Cryptography Module
//!
//! This module provides all cryptographic primitives used by Cipher Core.
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CRYPTOGRAPHIC COMPONENTS                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────────────────┐  │
//! │  │    Codec      │   │     KDF       │   │         Vault             │  │
//! │  │               │   │               │   │                           │  │
//! │  │ bytes ⇄ text  │──►│ PBKDF2-SHA256 │──►│ AES-256-GCM wrap/unwrap   │  │
//! │  │ (base64)      │   │ 100k iters    │   │ salt ‖ nonce ‖ ct ‖ tag   │  │
//! │  └───────────────┘   └───────────────┘   └───────────────────────────┘  │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  ┌───────────────────────────┐   ┌───────────────────────────────────┐  │
//! │  │       Key Manager         │   │         Message Cipher            │  │
//! │  │                           │   │                                   │  │
//! │  │ RSA-2048 generate         │──►│ RSA-OAEP-SHA256 per message       │  │
//! │  │ SPKI / PKCS#8 export      │   │ ≤ 190 bytes plaintext             │  │
//! │  │ encrypt-only / decrypt-   │   │ independent, stateless            │  │
//! │  │ only handles              │   │                                   │  │
//! │  └───────────────────────────┘   └───────────────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose | Notes |
//! |-----------|---------|-------|
//! | RSA-2048 OAEP/SHA-256 | Message encryption | Matches keys already published by users |
//! | PBKDF2-HMAC-SHA256 | Password → wrapping key | Iterations configurable |
//! | AES-256-GCM | Private key at rest | 96-bit random nonce, empty AAD |
//! | Base64 (standard, padded) | Text transport | All blobs cross storage as text |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: derived keys, unwrapped secrets and private keys
//!    are zeroized when dropped
//! 2. **Secure Random**: `rand::rngs::OsRng` unless a caller injects an RNG
//! 3. **No Nonce Reuse**: fresh salt and nonce on every wrap
//! 4. **Blinded RSA decryption** to blunt timing side channels
//!
//! All functions here are stateless apart from randomness draws and can be
//! called concurrently.

mod codec;
mod kdf;
mod keys;
mod message;
mod vault;

pub use codec::{decode, encode};
pub use kdf::{derive_key, KdfParams, SymmetricKey, DEFAULT_ITERATIONS, KEY_SIZE, SALT_SIZE};
pub use keys::{
    KeyManager, KeyPair, PrivateKeyHandle, PublicKeyHandle, DEFAULT_KEY_BITS, MIN_KEY_BITS,
    SUPPORTED_KEY_BITS,
};
pub use message::{
    decrypt_message, encrypt_message, encrypt_message_with_rng, max_plaintext_len,
    OAEP_SHA256_OVERHEAD,
};
pub use vault::{Vault, WrappedSecret, NONCE_SIZE, TAG_SIZE};

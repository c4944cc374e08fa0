//! Runtime configuration for Cipher Core.

use serde::{Deserialize, Serialize};

use crate::crypto::{KdfParams, KeyManager, DEFAULT_KEY_BITS};
use crate::error::{Error, Result};

/// Lowest PBKDF2 iteration count accepted from configuration
pub const MIN_KDF_ITERATIONS: u32 = 10_000;

/// Where the unwrapped private key lives between calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyResidency {
    /// Process memory only; a restart requires the password again
    #[default]
    SessionMemory,
    /// Also kept in the device store so a restarted process resumes
    ///
    /// Weaker: the key sits unwrapped in device storage until logout.
    DeviceStore,
}

/// Configuration for Cipher Core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Password derivation parameters for the vault
    pub kdf: KdfParams,
    /// RSA modulus size for newly generated identities
    pub rsa_key_bits: usize,
    /// Private key residency policy
    pub key_residency: KeyResidency,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            rsa_key_bits: DEFAULT_KEY_BITS,
            key_residency: KeyResidency::default(),
        }
    }
}

impl CoreConfig {
    /// Parse and validate a JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would weaken or break the crypto
    pub fn validate(&self) -> Result<()> {
        if self.kdf.iterations < MIN_KDF_ITERATIONS {
            return Err(Error::InvalidConfig(format!(
                "kdf.iterations must be at least {} (got {})",
                MIN_KDF_ITERATIONS, self.kdf.iterations
            )));
        }
        KeyManager::new(self.rsa_key_bits)?;
        Ok(())
    }

    /// Key manager for the configured modulus size
    pub fn key_manager(&self) -> Result<KeyManager> {
        KeyManager::new(self.rsa_key_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();

        assert_eq!(config.kdf.iterations, 100_000);
        assert_eq!(config.rsa_key_bits, 2048);
        assert_eq!(config.key_residency, KeyResidency::SessionMemory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = CoreConfig::from_json(r#"{"kdf": {"iterations": 310000}}"#).unwrap();

        assert_eq!(config.kdf.iterations, 310_000);
        assert_eq!(config.rsa_key_bits, 2048);
    }

    #[test]
    fn test_from_json_residency() {
        let config = CoreConfig::from_json(r#"{"key_residency": "device_store"}"#).unwrap();
        assert_eq!(config.key_residency, KeyResidency::DeviceStore);
    }

    #[test]
    fn test_rejects_weak_iterations() {
        let result = CoreConfig::from_json(r#"{"kdf": {"iterations": 1000}}"#);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unsupported_key_size() {
        let result = CoreConfig::from_json(r#"{"rsa_key_bits": 1024}"#);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            CoreConfig::from_json("{not json"),
            Err(Error::InvalidConfig(_))
        ));
    }
}

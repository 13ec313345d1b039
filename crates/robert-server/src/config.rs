//! Server configuration and secrets.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use robert_crypto::{EcdhKeyPair, FederationCipher, KeyEncryptionKey, FEDERATION_KEY_LENGTH};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigError;

/// Default service start: 2020-06-01T00:00:00Z.
pub const DEFAULT_SERVICE_START_UNIX: i64 = 1_590_969_600;

/// Default epoch duration in seconds (15 minutes).
pub const DEFAULT_EPOCH_DURATION_SECS: u32 = 900;

/// Non-secret tunables. Every field has a default so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Instant of epoch 0, in Unix seconds.
    pub service_start_unix: i64,
    /// Epoch duration in seconds. Must divide one day.
    pub epoch_duration_secs: u32,
    /// Days of past server keys kept for decryption.
    pub key_retention_days: u32,
    /// Days of future server keys provisioned ahead of time.
    pub key_lookahead_days: u32,
    /// Country code of this server, compared with decrypted ECCs.
    pub country_code: u8,
    /// Bound on each identity store round trip, in milliseconds.
    pub store_timeout_ms: u64,
    /// Random idA draws before registration gives up.
    pub max_id_allocation_attempts: u32,
    /// Days of tuples returned at registration.
    pub registration_bundle_days: u32,
    /// Upper bound on days of tuples a status request may ask for.
    pub max_bundle_days: u32,
    /// Seconds between server key refreshes.
    pub key_rotation_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_start_unix: DEFAULT_SERVICE_START_UNIX,
            epoch_duration_secs: DEFAULT_EPOCH_DURATION_SECS,
            key_retention_days: 14,
            key_lookahead_days: 5,
            country_code: 0x21,
            store_timeout_ms: 2_000,
            max_id_allocation_attempts: 10,
            registration_bundle_days: 4,
            max_bundle_days: 5,
            key_rotation_interval_secs: 3_600,
        }
    }
}

impl ServerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch_duration_secs == 0 || 86_400 % self.epoch_duration_secs != 0 {
            return Err(ConfigError::Invalid(format!(
                "epoch_duration_secs must divide 86400, got {}",
                self.epoch_duration_secs
            )));
        }
        if self.max_id_allocation_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_id_allocation_attempts must be at least 1".to_string(),
            ));
        }
        if self.registration_bundle_days == 0 || self.max_bundle_days == 0 {
            return Err(ConfigError::Invalid(
                "bundle day counts must be at least 1".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store_timeout_ms must be positive".to_string(),
            ));
        }
        if self.key_rotation_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "key_rotation_interval_secs must be positive".to_string(),
            ));
        }
        if DateTime::<Utc>::from_timestamp(self.service_start_unix, 0).is_none() {
            return Err(ConfigError::Invalid(format!(
                "service_start_unix out of range: {}",
                self.service_start_unix
            )));
        }
        Ok(())
    }

    pub fn service_start(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.service_start_unix, 0).unwrap_or_default()
    }

    pub fn epoch_duration(&self) -> Duration {
        Duration::seconds(i64::from(self.epoch_duration_secs))
    }

    pub fn store_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.store_timeout_ms)
    }

    pub fn key_rotation_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.key_rotation_interval_secs)
    }
}

/// Secret material handed to the request processor at start-up.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ServerSecrets {
    /// Long-term P-256 scalar for registration key agreement.
    pub ecdh_private_key: [u8; 32],
    /// K_G, shared across the federation for country codes.
    pub federation_key: [u8; FEDERATION_KEY_LENGTH],
    /// Master secret the identity key-encryption key is derived from.
    pub key_encryption_master: Vec<u8>,
}

/// Secrets expanded into ready-to-use primitives.
pub(crate) struct LoadedSecrets {
    pub ecdh: EcdhKeyPair,
    pub federation: FederationCipher,
    pub kek: KeyEncryptionKey,
}

impl ServerSecrets {
    pub(crate) fn load(&self) -> Result<LoadedSecrets, ConfigError> {
        Ok(LoadedSecrets {
            ecdh: EcdhKeyPair::from_bytes(&self.ecdh_private_key)?,
            federation: FederationCipher::new(&self.federation_key)?,
            kek: KeyEncryptionKey::derive(&self.key_encryption_master)?,
        })
    }
}

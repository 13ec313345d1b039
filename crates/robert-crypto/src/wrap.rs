//! At-rest protection of per-identity keys.
//!
//! K_A and K_EA are stored wrapped with AES-KW (RFC 3394) under a
//! key-encryption key derived from the operator's master secret:
//!
//! kek = HKDF-SHA256(master, salt="robert:kek-salt:v1", info="robert:identity-kek:v1")
//!
//! Wrapped key wire format: [AES-KW(KEK, key):40] = 40 bytes total

use aes_kw::Kek;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::kdf::hkdf_derive;
use crate::types::IDENTITY_KEY_LENGTH;

/// Size of a wrapped identity key: AES-KW adds one 8-byte block.
pub const WRAPPED_KEY_SIZE: usize = IDENTITY_KEY_LENGTH + 8;

const KEK_SALT: &[u8] = b"robert:kek-salt:v1";
const KEK_INFO: &[u8] = b"robert:identity-kek:v1";

/// Key-encryption key for identity key material.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyEncryptionKey {
    bytes: [u8; 32],
}

impl KeyEncryptionKey {
    /// Derive the KEK from a master secret (at least 32 bytes).
    pub fn derive(master_secret: &[u8]) -> Result<Self, CryptoError> {
        if master_secret.len() < 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                got: master_secret.len(),
            });
        }
        Ok(Self {
            bytes: hkdf_derive(master_secret, KEK_SALT, KEK_INFO)?,
        })
    }

    /// Wrap an identity key with AES-KW (RFC 3394).
    ///
    /// # Arguments
    /// * `key` - K_A or K_EA (32 bytes)
    ///
    /// # Returns
    /// 40-byte wrapped key, or `InvalidKeyLength` for any other input size
    pub fn wrap(&self, key: &[u8]) -> Result<[u8; WRAPPED_KEY_SIZE], CryptoError> {
        if key.len() != IDENTITY_KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: IDENTITY_KEY_LENGTH,
                got: key.len(),
            });
        }
        let mut wrapped = [0u8; WRAPPED_KEY_SIZE];
        Kek::from(self.bytes)
            .wrap(key, &mut wrapped)
            .map_err(|e| CryptoError::WrapFailed(format!("{:?}", e)))?;
        Ok(wrapped)
    }

    /// Unwrap a 40-byte wrapped identity key. The caller zeroizes the result.
    pub fn unwrap(&self, wrapped: &[u8]) -> Result<[u8; IDENTITY_KEY_LENGTH], CryptoError> {
        if wrapped.len() != WRAPPED_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: WRAPPED_KEY_SIZE,
                got: wrapped.len(),
            });
        }
        let mut key = [0u8; IDENTITY_KEY_LENGTH];
        Kek::from(self.bytes)
            .unwrap(wrapped, &mut key)
            .map_err(|e| CryptoError::UnwrapFailed(format!("{:?}", e)))?;
        Ok(key)
    }
}

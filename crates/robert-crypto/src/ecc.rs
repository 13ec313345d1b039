//! Encrypted country code (ECC).
//!
//! ecc = AES-256(K_G, [ebid:8][0:8])[0] XOR countryCode
//!
//! The mask depends on the EBID, so the same country code looks different
//! in every epoch. Decryption is the same XOR.

use aes_gcm::aes::cipher::generic_array::GenericArray;
use aes_gcm::aes::cipher::{BlockEncrypt, KeyInit};
use aes_gcm::aes::Aes256;

use crate::error::CryptoError;
use crate::types::{EBID_LENGTH, FEDERATION_KEY_LENGTH};

/// Country-code cipher bound to the federation key K_G.
pub struct FederationCipher {
    cipher: Aes256,
}

impl FederationCipher {
    pub fn new(federation_key: &[u8]) -> Result<Self, CryptoError> {
        if federation_key.len() != FEDERATION_KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: FEDERATION_KEY_LENGTH,
                got: federation_key.len(),
            });
        }
        let cipher = Aes256::new_from_slice(federation_key).map_err(|_| {
            CryptoError::InvalidKeyLength {
                expected: FEDERATION_KEY_LENGTH,
                got: federation_key.len(),
            }
        })?;
        Ok(Self { cipher })
    }

    fn mask(&self, ebid: &[u8; EBID_LENGTH]) -> u8 {
        let mut block = GenericArray::from([0u8; 16]);
        block[..EBID_LENGTH].copy_from_slice(ebid);
        self.cipher.encrypt_block(&mut block);
        block[0]
    }

    pub fn encrypt_country_code(&self, country_code: u8, ebid: &[u8; EBID_LENGTH]) -> u8 {
        self.mask(ebid) ^ country_code
    }

    pub fn decrypt_country_code(&self, ecc: u8, ebid: &[u8; EBID_LENGTH]) -> u8 {
        self.mask(ebid) ^ ecc
    }
}

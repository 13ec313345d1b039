//! AES-256-GCM sealing of tuple bundles under K_EA.
//!
//! Wire format: [12 bytes: IV][N bytes: ciphertext + 16-byte tag]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::CryptoError;
use crate::types::{AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, IDENTITY_KEY_LENGTH};

/// Generate a random 12-byte IV for AES-GCM.
pub fn generate_iv() -> Result<[u8; AES_GCM_IV_LENGTH], CryptoError> {
    let mut iv = [0u8; AES_GCM_IV_LENGTH];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(iv)
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    if key.len() != IDENTITY_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: IDENTITY_KEY_LENGTH,
            got: key.len(),
        });
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Encrypt `plaintext` with a fresh IV. Returns IV ‖ ciphertext ‖ tag.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher(key)?;
    let iv = generate_iv()?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(iv.len() + ciphertext.len());
    result.extend_from_slice(&iv);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt IV ‖ ciphertext ‖ tag.
pub fn open(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < AES_GCM_IV_LENGTH + AES_GCM_TAG_LENGTH {
        return Err(CryptoError::DataTooShort);
    }
    let cipher = cipher(key)?;
    let (iv, ciphertext) = sealed.split_at(AES_GCM_IV_LENGTH);
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        getrandom::getrandom(&mut key).unwrap();
        key
    }

    #[test]
    fn seal_open_round_trip() {
        let key = random_key();
        let sealed = seal(&key, b"[{\"epochId\":1}]").unwrap();
        assert_eq!(open(&key, &sealed).unwrap(), b"[{\"epochId\":1}]");
    }

    #[test]
    fn sealed_layout_has_iv_and_tag() {
        let sealed = seal(&random_key(), b"abc").unwrap();
        assert_eq!(sealed.len(), AES_GCM_IV_LENGTH + 3 + AES_GCM_TAG_LENGTH);
    }

    #[test]
    fn fresh_iv_per_seal() {
        let key = random_key();
        let a = seal(&key, b"same").unwrap();
        let b = seal(&key, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal(&random_key(), b"secret").unwrap();
        assert!(matches!(
            open(&random_key(), &sealed),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = random_key();
        let mut sealed = seal(&key, b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(open(&key, &sealed).is_err());
    }

    #[test]
    fn too_short_fails() {
        assert!(matches!(
            open(&random_key(), &[0u8; 20]),
            Err(CryptoError::DataTooShort)
        ));
    }
}

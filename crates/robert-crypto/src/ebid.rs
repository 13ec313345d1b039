//! Ephemeral Bluetooth identifiers.
//!
//! Plaintext layout: [epoch:3 BE][idA:5], encrypted as a single SKINNY-64/192
//! block under the server key of the epoch's date. The EBID carries no
//! integrity check of its own.

use crate::error::CryptoError;
use crate::skinny::Skinny64;
use crate::types::{IdA, EBID_LENGTH, ID_A_LENGTH, MAX_EBID_EPOCH};

/// EBID cipher bound to one per-date server key.
pub struct EbidCipher {
    cipher: Skinny64,
}

impl EbidCipher {
    /// Create a cipher from a 24-byte server key.
    pub fn new(server_key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: Skinny64::new(server_key)?,
        })
    }

    /// Encrypt `epoch ‖ id_a` into an EBID.
    ///
    /// # Arguments
    /// * `epoch` - Epoch index, at most 24 bits
    /// * `id_a` - Permanent identifier (5 bytes)
    ///
    /// # Returns
    /// 8-byte EBID, or `EpochOutOfRange` if `epoch` exceeds 24 bits
    pub fn encrypt(&self, epoch: u32, id_a: &IdA) -> Result<[u8; EBID_LENGTH], CryptoError> {
        if epoch > MAX_EBID_EPOCH {
            return Err(CryptoError::EpochOutOfRange(epoch));
        }
        let mut block = [0u8; EBID_LENGTH];
        block[..3].copy_from_slice(&epoch.to_be_bytes()[1..]);
        block[3..].copy_from_slice(id_a);
        self.cipher.encrypt_block(&mut block);
        Ok(block)
    }

    /// Decrypt an EBID into its embedded epoch and idA.
    ///
    /// Always succeeds: a wrong key or a forged block yields garbage that the
    /// caller must reject by comparing the epoch with the claimed one.
    pub fn decrypt(&self, ebid: &[u8; EBID_LENGTH]) -> (u32, IdA) {
        let mut block = *ebid;
        self.cipher.decrypt_block(&mut block);
        let epoch = u32::from_be_bytes([0, block[0], block[1], block[2]]);
        let mut id_a = [0u8; ID_A_LENGTH];
        id_a.copy_from_slice(&block[3..]);
        (epoch, id_a)
    }
}

/// One-shot EBID encryption.
pub fn encrypt_ebid(
    server_key: &[u8],
    epoch: u32,
    id_a: &IdA,
) -> Result<[u8; EBID_LENGTH], CryptoError> {
    EbidCipher::new(server_key)?.encrypt(epoch, id_a)
}

/// One-shot EBID decryption.
pub fn decrypt_ebid(server_key: &[u8], ebid: &[u8; EBID_LENGTH]) -> Result<(u32, IdA), CryptoError> {
    Ok(EbidCipher::new(server_key)?.decrypt(ebid))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> [u8; 24] {
        let mut key = [0u8; 24];
        getrandom::getrandom(&mut key).unwrap();
        key
    }

    #[test]
    fn round_trip() {
        let cipher = EbidCipher::new(&random_key()).unwrap();
        let id_a = [0x01, 0x02, 0x03, 0x04, 0x05];
        for epoch in [0u32, 1, 96, 12_345, MAX_EBID_EPOCH] {
            let ebid = cipher.encrypt(epoch, &id_a).unwrap();
            assert_eq!(cipher.decrypt(&ebid), (epoch, id_a));
        }
    }

    #[test]
    fn ciphertext_hides_plaintext_layout() {
        let cipher = EbidCipher::new(&random_key()).unwrap();
        let id_a = [0xaa; 5];
        let ebid = cipher.encrypt(7, &id_a).unwrap();
        assert_ne!(&ebid[3..], &id_a);
    }

    #[test]
    fn consecutive_epochs_give_unlinkable_ebids() {
        let cipher = EbidCipher::new(&random_key()).unwrap();
        let id_a = [9; 5];
        let a = cipher.encrypt(100, &id_a).unwrap();
        let b = cipher.encrypt(101, &id_a).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let id_a = [1, 2, 3, 4, 5];
        let ebid = encrypt_ebid(&random_key(), 4242, &id_a).unwrap();
        let (epoch, decoded) = decrypt_ebid(&random_key(), &ebid).unwrap();
        assert!(epoch != 4242 || decoded != id_a);
    }

    #[test]
    fn rejects_epoch_wider_than_24_bits() {
        let cipher = EbidCipher::new(&random_key()).unwrap();
        assert!(matches!(
            cipher.encrypt(MAX_EBID_EPOCH + 1, &[0; 5]),
            Err(CryptoError::EpochOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_invalid_key_length() {
        assert!(EbidCipher::new(&[0u8; 32]).is_err());
    }
}

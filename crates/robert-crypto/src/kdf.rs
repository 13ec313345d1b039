//! HKDF-SHA256, used for the identity KEK and for derived per-date server
//! keys.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;

/// Expand `ikm` into an `N`-byte key. `N` may be 24 (SKINNY server keys) or
/// 32 (AES keys); anything above 255 hash lengths is rejected.
pub fn hkdf_derive<const N: usize>(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
) -> Result<[u8; N], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; N];
    hk.expand(info, &mut okm)
        .map_err(|_| CryptoError::InvalidKeyLength {
            expected: 255 * 32,
            got: N,
        })?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let ikm = [0x42u8; 32];
        let a: [u8; 32] = hkdf_derive(&ikm, b"test-salt", b"test-info").unwrap();
        let b: [u8; 32] = hkdf_derive(&ikm, b"test-salt", b"test-info").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_info_different_keys() {
        let ikm = [0x42u8; 32];
        let a: [u8; 24] = hkdf_derive(&ikm, b"salt", b"info-a").unwrap();
        let b: [u8; 24] = hkdf_derive(&ikm, b"salt", b"info-b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn shorter_output_is_prefix_of_longer() {
        let ikm = [0x01u8; 32];
        let short: [u8; 24] = hkdf_derive(&ikm, b"salt", b"info").unwrap();
        let long: [u8; 32] = hkdf_derive(&ikm, b"salt", b"info").unwrap();
        assert_eq!(&long[..24], &short);
    }

    #[test]
    fn rejects_oversized_output() {
        let result: Result<[u8; 255 * 32 + 1], _> = hkdf_derive(&[0u8; 32], b"s", b"i");
        assert!(result.is_err());
    }
}

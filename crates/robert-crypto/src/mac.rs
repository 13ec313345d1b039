//! Request and HELLO message authentication codes.
//!
//! Request MAC: HMAC-SHA256(K_A, [type:1][ebid:8][epochId:4 BE][time:4]).
//! HELLO MAC:   HMAC-SHA256(K_A, [0x01][ecc:1][ebid:8][time:2]), first 5 bytes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CryptoError;
use crate::types::{
    RequestType, EBID_LENGTH, HELLO_MAC_LENGTH, HELLO_TIME_LENGTH, IDENTITY_KEY_LENGTH,
    MAC_LENGTH, TIME_LENGTH,
};

type HmacSha256 = Hmac<Sha256>;

/// Length of the request MAC preimage.
pub const MAC_PREIMAGE_LENGTH: usize = 1 + EBID_LENGTH + 4 + TIME_LENGTH;

/// Length of the HELLO MAC preimage.
pub const HELLO_PREIMAGE_LENGTH: usize = 1 + 1 + EBID_LENGTH + HELLO_TIME_LENGTH;

fn keyed(key: &[u8]) -> Result<HmacSha256, CryptoError> {
    if key.len() != IDENTITY_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: IDENTITY_KEY_LENGTH,
            got: key.len(),
        });
    }
    HmacSha256::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: IDENTITY_KEY_LENGTH,
        got: key.len(),
    })
}

/// Build the 17-byte request MAC preimage.
pub fn build_mac_preimage(
    request_type: RequestType,
    ebid: &[u8; EBID_LENGTH],
    epoch_id: u32,
    time: &[u8; TIME_LENGTH],
) -> [u8; MAC_PREIMAGE_LENGTH] {
    let mut preimage = [0u8; MAC_PREIMAGE_LENGTH];
    preimage[0] = request_type.salt();
    preimage[1..9].copy_from_slice(ebid);
    preimage[9..13].copy_from_slice(&epoch_id.to_be_bytes());
    preimage[13..].copy_from_slice(time);
    preimage
}

/// Compute the request MAC with the identity key K_A.
///
/// # Arguments
/// * `key` - K_A (32 bytes)
/// * `request_type` - Purpose byte placed first in the preimage
/// * `ebid` - EBID as sent by the client
/// * `epoch_id` - Claimed epoch, big-endian in the preimage
/// * `time` - Truncated NTP timestamp as sent by the client
///
/// # Returns
/// 32-byte HMAC-SHA256 tag, or `InvalidKeyLength` for a key of the wrong size
pub fn compute_mac(
    key: &[u8],
    request_type: RequestType,
    ebid: &[u8; EBID_LENGTH],
    epoch_id: u32,
    time: &[u8; TIME_LENGTH],
) -> Result<[u8; MAC_LENGTH], CryptoError> {
    let mut mac = keyed(key)?;
    mac.update(&build_mac_preimage(request_type, ebid, epoch_id, time));
    let mut out = [0u8; MAC_LENGTH];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Verify a request MAC in constant time.
///
/// A candidate of the wrong length simply fails verification; callers that
/// need a field-size error check the length first.
pub fn verify_mac(
    key: &[u8],
    request_type: RequestType,
    ebid: &[u8; EBID_LENGTH],
    epoch_id: u32,
    time: &[u8; TIME_LENGTH],
    candidate: &[u8],
) -> Result<bool, CryptoError> {
    let mut mac = keyed(key)?;
    mac.update(&build_mac_preimage(request_type, ebid, epoch_id, time));
    Ok(mac.verify_slice(candidate).is_ok())
}

fn hello_mac(
    key: &[u8],
    ecc: u8,
    ebid: &[u8; EBID_LENGTH],
    time: &[u8; HELLO_TIME_LENGTH],
) -> Result<HmacSha256, CryptoError> {
    let mut preimage = [0u8; HELLO_PREIMAGE_LENGTH];
    preimage[0] = RequestType::Exchange.salt();
    preimage[1] = ecc;
    preimage[2..10].copy_from_slice(ebid);
    preimage[10..].copy_from_slice(time);

    let mut mac = keyed(key)?;
    mac.update(&preimage);
    Ok(mac)
}

/// Compute the truncated 5-byte HELLO MAC.
pub fn compute_hello_mac(
    key: &[u8],
    ecc: u8,
    ebid: &[u8; EBID_LENGTH],
    time: &[u8; HELLO_TIME_LENGTH],
) -> Result<[u8; HELLO_MAC_LENGTH], CryptoError> {
    let tag = hello_mac(key, ecc, ebid, time)?.finalize().into_bytes();
    let mut out = [0u8; HELLO_MAC_LENGTH];
    out.copy_from_slice(&tag[..HELLO_MAC_LENGTH]);
    Ok(out)
}

/// Verify a truncated HELLO MAC in constant time.
pub fn verify_hello_mac(
    key: &[u8],
    ecc: u8,
    ebid: &[u8; EBID_LENGTH],
    time: &[u8; HELLO_TIME_LENGTH],
    candidate: &[u8],
) -> Result<bool, CryptoError> {
    if candidate.len() != HELLO_MAC_LENGTH {
        return Ok(false);
    }
    Ok(hello_mac(key, ecc, ebid, time)?
        .verify_truncated_left(candidate)
        .is_ok())
}

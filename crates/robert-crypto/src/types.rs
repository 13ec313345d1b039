
use crate::error::CryptoError;

/// Length of the permanent identifier idA (40 bits).
pub const ID_A_LENGTH: usize = 5;

/// Length of an EBID: one SKINNY-64 block.
pub const EBID_LENGTH: usize = 8;

/// Largest epoch representable in the 24-bit EBID epoch field.
pub const MAX_EBID_EPOCH: u32 = 0x00ff_ffff;

/// Per-date server key length (SKINNY-64/192 tweakey).
pub const SERVER_KEY_LENGTH: usize = 24;

/// Per-identity key length (K_A and K_EA).
pub const IDENTITY_KEY_LENGTH: usize = 32;

/// Federation key length (AES-256, used for the ECC).
pub const FEDERATION_KEY_LENGTH: usize = 32;

/// Request MAC length (full HMAC-SHA256 tag).
pub const MAC_LENGTH: usize = 32;

/// Truncated NTP timestamp length carried by authenticated requests.
pub const TIME_LENGTH: usize = 4;

/// HELLO message MAC length (HMAC-SHA256 truncated to 40 bits).
pub const HELLO_MAC_LENGTH: usize = 5;

/// HELLO message time length (16 low bits of the NTP timestamp).
pub const HELLO_TIME_LENGTH: usize = 2;

/// AES-GCM IV length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_IV_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// Permanent identifier of a registered identity. Never sent in clear.
pub type IdA = [u8; ID_A_LENGTH];

/// Purpose tag mixed into the MAC preimage as its first byte.
///
/// A MAC produced for one purpose never verifies for another, even under
/// the same identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestType {
    /// HELLO message exchanged between devices.
    Exchange = 0x01,
    Status = 0x02,
    Unregister = 0x03,
    DeleteHistory = 0x04,
}

impl RequestType {
    /// Salt byte placed at the front of the MAC preimage.
    pub fn salt(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RequestType {
    type Error = CryptoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(RequestType::Exchange),
            0x02 => Ok(RequestType::Status),
            0x03 => Ok(RequestType::Unregister),
            0x04 => Ok(RequestType::DeleteHistory),
            other => Err(CryptoError::UnknownRequestType(other)),
        }
    }
}

//! Field-shape checks and MAC verification for authenticated requests.

use robert_crypto::{
    verify_hello_mac, verify_mac, RequestType, EBID_LENGTH, HELLO_MAC_LENGTH, HELLO_TIME_LENGTH,
    MAC_LENGTH, TIME_LENGTH,
};

use crate::error::{Result, ServerError};

pub(crate) fn check_time_size(time: &[u8]) -> Result<[u8; TIME_LENGTH]> {
    time.try_into()
        .map_err(|_| ServerError::bad_request("invalid time field size"))
}

pub(crate) fn check_mac_size(mac: &[u8]) -> Result<()> {
    if mac.len() != MAC_LENGTH {
        return Err(ServerError::bad_request("invalid MAC field size"));
    }
    Ok(())
}

pub(crate) fn check_hello_time_size(time: &[u8]) -> Result<[u8; HELLO_TIME_LENGTH]> {
    time.try_into()
        .map_err(|_| ServerError::bad_request("invalid time field size"))
}

pub(crate) fn check_hello_mac_size(mac: &[u8]) -> Result<()> {
    if mac.len() != HELLO_MAC_LENGTH {
        return Err(ServerError::bad_request("invalid MAC field size"));
    }
    Ok(())
}

/// Verify a request MAC with K_A. Any mismatch is `BadRequest("invalid MAC")`.
pub fn verify_request_mac(
    key_for_mac: &[u8],
    request_type: RequestType,
    ebid: &[u8; EBID_LENGTH],
    epoch_id: u32,
    time: &[u8; TIME_LENGTH],
    mac: &[u8],
) -> Result<()> {
    let valid = verify_mac(key_for_mac, request_type, ebid, epoch_id, time, mac)
        .map_err(|e| ServerError::internal(e.to_string()))?;
    if !valid {
        return Err(ServerError::bad_request("invalid MAC"));
    }
    Ok(())
}

pub fn verify_hello(
    key_for_mac: &[u8],
    ecc: u8,
    ebid: &[u8; EBID_LENGTH],
    time: &[u8; HELLO_TIME_LENGTH],
    mac: &[u8],
) -> Result<()> {
    let valid = verify_hello_mac(key_for_mac, ecc, ebid, time, mac)
        .map_err(|e| ServerError::internal(e.to_string()))?;
    if !valid {
        return Err(ServerError::bad_request("invalid MAC"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use robert_crypto::{compute_hello_mac, compute_mac};

    const KEY: [u8; 32] = [0x5a; 32];
    const EBID: [u8; 8] = [9, 8, 7, 6, 5, 4, 3, 2];
    const TIME: [u8; 4] = [0xe3, 0x11, 0x22, 0x33];

    #[test]
    fn field_size_messages() {
        assert_eq!(
            check_time_size(&[0u8; 3]),
            Err(ServerError::bad_request("invalid time field size"))
        );
        assert_eq!(
            check_mac_size(&[0u8; 31]),
            Err(ServerError::bad_request("invalid MAC field size"))
        );
        assert_eq!(check_time_size(&TIME).unwrap(), TIME);
        assert!(check_hello_time_size(&[0u8; 2]).is_ok());
        assert!(check_hello_mac_size(&[0u8; 6]).is_err());
    }

    #[test]
    fn request_mac_accepts_valid_and_rejects_tampered() {
        let mac = compute_mac(&KEY, RequestType::Status, &EBID, 10, &TIME).unwrap();
        verify_request_mac(&KEY, RequestType::Status, &EBID, 10, &TIME, &mac).unwrap();

        assert_eq!(
            verify_request_mac(&KEY, RequestType::DeleteHistory, &EBID, 10, &TIME, &mac),
            Err(ServerError::bad_request("invalid MAC"))
        );
        assert_eq!(
            verify_request_mac(&KEY, RequestType::Status, &EBID, 11, &TIME, &mac),
            Err(ServerError::bad_request("invalid MAC"))
        );
    }

    #[test]
    fn hello_mac_checked() {
        let time = [0x01, 0x02];
        let mac = compute_hello_mac(&KEY, 0x44, &EBID, &time).unwrap();
        verify_hello(&KEY, 0x44, &EBID, &time, &mac).unwrap();
        assert!(verify_hello(&KEY, 0x45, &EBID, &time, &mac).is_err());
    }

    #[test]
    fn corrupt_stored_key_is_internal() {
        let mac = [0u8; 32];
        let err = verify_request_mac(&KEY[..16], RequestType::Status, &EBID, 1, &TIME, &mac)
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}

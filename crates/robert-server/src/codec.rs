//! EBID encoding and decoding against the per-date key store.

use std::sync::Arc;

use robert_crypto::{EbidCipher, IdA, EBID_LENGTH};
use tracing::debug;

use crate::clock::Clock;
use crate::error::{Result, ServerError};
use crate::keystore::KeyStore;

/// Binds the EBID cipher to the clock (epoch → date) and the key store
/// (date → key).
#[derive(Clone)]
pub struct EbidCodec {
    clock: Arc<dyn Clock>,
    keys: Arc<dyn KeyStore>,
}

impl EbidCodec {
    pub fn new(clock: Arc<dyn Clock>, keys: Arc<dyn KeyStore>) -> Self {
        Self { clock, keys }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Cipher for the date of `epoch`.
    pub fn key_for_epoch(&self, epoch: u32) -> Result<Arc<EbidCipher>> {
        self.keys
            .key_for_date(self.clock.date_of(epoch))
            .ok_or(ServerError::KeyUnavailable { epoch })
    }

    /// A short EBID is the client's fault; an oversized one is not expected
    /// from any transport and is reported as internal.
    pub fn check_ebid_size(ebid: &[u8]) -> Result<[u8; EBID_LENGTH]> {
        if ebid.len() > EBID_LENGTH {
            return Err(ServerError::internal(format!(
                "EBID of {} bytes exceeds {EBID_LENGTH}",
                ebid.len()
            )));
        }
        ebid.try_into()
            .map_err(|_| ServerError::bad_request("invalid EBID field size"))
    }

    /// Decrypt `ebid` with the key of `claimed_epoch` and check that the
    /// embedded epoch matches.
    pub fn decode_for_claimed_epoch(&self, ebid: &[u8; EBID_LENGTH], claimed_epoch: u32) -> Result<IdA> {
        let cipher = self.key_for_epoch(claimed_epoch)?;
        let (epoch, id_a) = cipher.decrypt(ebid);
        if epoch != claimed_epoch {
            debug!(epoch_id = claimed_epoch, decoded_epoch = epoch, "EBID epoch mismatch");
            return Err(ServerError::bad_request("could not decrypt ebid content"));
        }
        Ok(id_a)
    }

    /// Encrypt `id_a` for `epoch` with that date's key.
    pub fn encode_for_epoch(&self, epoch: u32, id_a: &IdA) -> Result<[u8; EBID_LENGTH]> {
        let cipher = self.key_for_epoch(epoch)?;
        cipher
            .encrypt(epoch, id_a)
            .map_err(|e| ServerError::internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::ServerConfig;
    use crate::keystore::{DateKey, KeySnapshot, SnapshotKeyStore};

    const ID: IdA = [0xa1, 0xb2, 0xc3, 0xd4, 0xe5];

    fn codec() -> EbidCodec {
        let config = ServerConfig::default();
        let clock = Arc::new(FixedClock::from_config(&config, config.service_start()));
        // Keys for day 0 and day 1 of the service.
        let keys = vec![
            DateKey::new(clock.date_of(0), [0x10u8; 24]),
            DateKey::new(clock.date_of(96), [0x20u8; 24]),
        ];
        let store = SnapshotKeyStore::with_snapshot(KeySnapshot::from_keys(&keys).unwrap());
        EbidCodec::new(clock, Arc::new(store))
    }

    #[test]
    fn encode_then_decode_for_same_epoch() {
        let codec = codec();
        for epoch in [0, 1, 95, 96, 191] {
            let ebid = codec.encode_for_epoch(epoch, &ID).unwrap();
            assert_eq!(codec.decode_for_claimed_epoch(&ebid, epoch).unwrap(), ID);
        }
    }

    #[test]
    fn neighbouring_claimed_epoch_is_bad_request() {
        let codec = codec();
        let ebid = codec.encode_for_epoch(50, &ID).unwrap();
        assert_eq!(
            codec.decode_for_claimed_epoch(&ebid, 49),
            Err(ServerError::bad_request("could not decrypt ebid content"))
        );
    }

    #[test]
    fn missing_date_key_is_key_unavailable() {
        let codec = codec();
        assert_eq!(
            codec.encode_for_epoch(192, &ID),
            Err(ServerError::KeyUnavailable { epoch: 192 })
        );
        assert_eq!(
            codec.decode_for_claimed_epoch(&[0u8; 8], 500),
            Err(ServerError::KeyUnavailable { epoch: 500 })
        );
    }

    #[test]
    fn ebid_size_asymmetry() {
        assert_eq!(
            EbidCodec::check_ebid_size(&[0u8; 7]),
            Err(ServerError::bad_request("invalid EBID field size"))
        );
        assert_eq!(EbidCodec::check_ebid_size(&[0u8; 9]).unwrap_err().status_code(), 500);
        assert_eq!(EbidCodec::check_ebid_size(&[3u8; 8]).unwrap(), [3u8; 8]);
    }
}

//! Encrypted tuple bundles.
//!
//! A bundle lists, for a run of epochs, the EBID and ECC a client will
//! broadcast. It is serialized as
//! `[{"epochId":n,"key":{"ebid":"<b64>","ecc":"<b64>"}}, ...]` and sealed with
//! AES-256-GCM under K_EA.

use std::sync::Arc;

use chrono::NaiveDate;
use robert_crypto::{open, seal, EbidCipher, FederationCipher, IdA, EBID_LENGTH, MAX_EBID_EPOCH};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::EbidCodec;
use crate::error::{Result, ServerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralTuple {
    pub epoch_id: u32,
    pub key: TupleKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleKey {
    #[serde(with = "base64_ebid")]
    pub ebid: [u8; EBID_LENGTH],
    #[serde(with = "base64_byte")]
    pub ecc: u8,
}

mod base64_ebid {
    use base64ct::{Base64, Encoding};
    use robert_crypto::EBID_LENGTH;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ebid: &[u8; EBID_LENGTH], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&Base64::encode_string(ebid))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; EBID_LENGTH], D::Error> {
        let encoded = String::deserialize(d)?;
        let bytes = Base64::decode_vec(&encoded).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom("ebid must be 8 bytes"))
    }
}

mod base64_byte {
    use base64ct::{Base64, Encoding};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(byte: &u8, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&Base64::encode_string(&[*byte]))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        let encoded = String::deserialize(d)?;
        match Base64::decode_vec(&encoded).map_err(de::Error::custom)?.as_slice() {
            [byte] => Ok(*byte),
            _ => Err(de::Error::custom("ecc must be 1 byte")),
        }
    }
}

/// Tuples for `days` days of epochs starting at `from_epoch`.
///
/// Epochs whose date key is not retained are skipped.
pub fn build_tuples(
    codec: &EbidCodec,
    federation: &FederationCipher,
    id_a: &IdA,
    country_code: u8,
    from_epoch: u32,
    days: u32,
) -> Result<Vec<EphemeralTuple>> {
    let span = days.saturating_mul(codec.clock().epochs_per_day());
    let end = from_epoch.saturating_add(span).min(MAX_EBID_EPOCH + 1);

    let mut tuples = Vec::with_capacity(end.saturating_sub(from_epoch) as usize);
    let mut cached: Option<(NaiveDate, Option<Arc<EbidCipher>>)> = None;
    let mut skipped = 0u32;

    for epoch in from_epoch..end {
        let date = codec.clock().date_of(epoch);
        let cipher = match &cached {
            Some((cached_date, cipher)) if *cached_date == date => cipher.clone(),
            _ => {
                let cipher = codec.key_for_epoch(epoch).ok();
                cached = Some((date, cipher.clone()));
                cipher
            }
        };
        let Some(cipher) = cipher else {
            skipped += 1;
            continue;
        };

        let ebid = cipher
            .encrypt(epoch, id_a)
            .map_err(|e| ServerError::internal(e.to_string()))?;
        tuples.push(EphemeralTuple {
            epoch_id: epoch,
            key: TupleKey {
                ebid,
                ecc: federation.encrypt_country_code(country_code, &ebid),
            },
        });
    }

    if skipped > 0 {
        debug!(from_epoch, skipped, built = tuples.len(), "skipped epochs without a server key");
    }
    Ok(tuples)
}

/// Serialize and seal a bundle under K_EA. An empty bundle is an error.
pub fn seal_tuples(key_for_tuples: &[u8], tuples: &[EphemeralTuple]) -> Result<Vec<u8>> {
    if tuples.is_empty() {
        return Err(ServerError::internal("no tuples could be generated"));
    }
    let json = serde_json::to_vec(tuples).map_err(|e| ServerError::internal(e.to_string()))?;
    seal(key_for_tuples, &json).map_err(|e| ServerError::internal(e.to_string()))
}

/// Open a sealed bundle with K_EA. This is what a client does on receipt.
pub fn open_tuples(key_for_tuples: &[u8], sealed: &[u8]) -> Result<Vec<EphemeralTuple>> {
    let json = open(key_for_tuples, sealed).map_err(|e| ServerError::bad_request(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| ServerError::bad_request(e.to_string()))
}

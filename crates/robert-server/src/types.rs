//! Request and response shapes of the processor operations.
//!
//! Variable-length fields are kept as raw bytes so their sizes can be
//! checked before any cryptography runs.

use robert_crypto::IdA;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// P-256 public key, SEC1 point or SubjectPublicKeyInfo DER.
    pub client_public_key: Vec<u8>,
    pub country_code: u8,
    /// First epoch of the returned tuple bundle.
    pub from_epoch_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id_a: IdA,
    /// Tuple bundle sealed under K_EA.
    pub tuples: Vec<u8>,
}

/// Fields common to every MAC-authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub ebid: Vec<u8>,
    pub epoch_id: u32,
    /// Low 32 bits of the client's NTP timestamp, big-endian.
    pub time: Vec<u8>,
    pub mac: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub id_a: IdA,
    pub epoch_id: u32,
    pub country_code: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    #[serde(flatten)]
    pub auth: AuthRequest,
    pub from_epoch_id: u32,
    pub number_of_days_for_epoch_bundles: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id_a: IdA,
    pub epoch_id: u32,
    pub tuples: Vec<u8>,
}

/// A HELLO message relayed by a contact's device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloRequest {
    /// Encrypted country code, 1 byte.
    pub ecc: Vec<u8>,
    pub ebid: Vec<u8>,
    pub epoch_id: u32,
    /// Low 16 bits of the emitter's NTP seconds.
    pub time: Vec<u8>,
    /// Truncated HELLO MAC, 5 bytes.
    pub mac: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloOutcome {
    /// The HELLO belongs to an identity registered here.
    Local(AuthResponse),
    /// The HELLO was emitted under another federation member's country code.
    Foreign { country_code: u8 },
}

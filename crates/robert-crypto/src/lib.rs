//! Cryptographic primitives of the ROBERT proximity-tracing back-end.
//!
//! - SKINNY-64/192 and the 8-byte EBID built on it
//! - Request and HELLO MACs (HMAC-SHA256)
//! - Encrypted country codes (AES-256)
//! - P-256 registration key agreement (K_A, K_EA)
//! - AES-KW wrapping of identity keys at rest
//! - AES-256-GCM sealing of tuple bundles
//!
//! Nothing here performs I/O or reads the clock.

pub mod agreement;
pub mod ebid;
pub mod ecc;
pub mod error;
pub mod kdf;
pub mod mac;
pub mod sealing;
pub mod skinny;
pub mod types;
pub mod wrap;

pub use agreement::{parse_public_key, EcdhKeyPair, IdentityKeys};
pub use ebid::{decrypt_ebid, encrypt_ebid, EbidCipher};
pub use ecc::FederationCipher;
pub use error::CryptoError;
pub use kdf::hkdf_derive;
pub use mac::{
    build_mac_preimage, compute_hello_mac, compute_mac, verify_hello_mac, verify_mac,
    MAC_PREIMAGE_LENGTH,
};
pub use sealing::{open, seal};
pub use skinny::Skinny64;
pub use types::{
    IdA, RequestType, EBID_LENGTH, FEDERATION_KEY_LENGTH, HELLO_MAC_LENGTH, HELLO_TIME_LENGTH,
    IDENTITY_KEY_LENGTH, ID_A_LENGTH, MAC_LENGTH, MAX_EBID_EPOCH, SERVER_KEY_LENGTH, TIME_LENGTH,
};
pub use wrap::{KeyEncryptionKey, WRAPPED_KEY_SIZE};

//! Authentication oracle of the ROBERT proximity-tracing back-end.
//!
//! Issues pseudonymous identities and validates every request a mobile
//! client makes afterwards: epoch arithmetic, per-date server keys, EBID
//! decoding, request MACs and HELLO messages. Storage of identities and the
//! origin of server keys are pluggable through async traits.

pub mod auth;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod keystore;
pub mod processor;
pub mod tuples;
pub mod types;

pub use auth::{verify_hello, verify_request_mac};
pub use clock::{Clock, FixedClock, SystemClock, NTP_UNIX_OFFSET_SECS};
pub use codec::EbidCodec;
pub use config::{ServerConfig, ServerSecrets};
pub use error::{ConfigError, KeySourceError, Result, ServerError, StoreError};
pub use identity::{IdentityRecord, IdentityStore, MemoryIdentityStore};
pub use keystore::{
    DateKey, DateKeySource, DerivedKeySource, KeyRotation, KeySnapshot, KeyStore, SnapshotKeyStore,
};
pub use processor::RequestProcessor;
pub use tuples::{build_tuples, open_tuples, seal_tuples, EphemeralTuple, TupleKey};
pub use types::{
    AuthRequest, AuthResponse, HelloOutcome, HelloRequest, RegistrationRequest,
    RegistrationResponse, StatusRequest, StatusResponse,
};

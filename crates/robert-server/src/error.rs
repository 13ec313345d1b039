use robert_crypto::CryptoError;
use thiserror::Error;

/// Outcome taxonomy of every request-processing operation.
///
/// Each variant maps to one wire status so callers can translate without
/// inspecting messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServerError {
    /// Malformed field, EBID/epoch inconsistency or MAC mismatch.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The decrypted idA has no registration.
    #[error("Identity not found")]
    NotFound,

    /// No server key is retained for the date of this epoch.
    #[error("No server key available for epoch {epoch}")]
    KeyUnavailable { epoch: u32 },

    /// Store failure, timeout, or a condition the client cannot fix.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        ServerError::BadRequest(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        ServerError::Internal(reason.into())
    }

    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::BadRequest(_) => 400,
            ServerError::NotFound => 404,
            ServerError::KeyUnavailable { .. } => 430,
            ServerError::Internal(_) => 500,
        }
    }

    /// Stable label for telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "bad_request",
            ServerError::NotFound => "not_found",
            ServerError::KeyUnavailable { .. } => "key_unavailable",
            ServerError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Failure reported by an [`IdentityStore`](crate::identity::IdentityStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Identity already exists")]
    AlreadyExists,

    #[error("Identity store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

/// Failure while provisioning per-date server keys.
#[derive(Debug, Error)]
pub enum KeySourceError {
    #[error("Key source unavailable: {0}")]
    Unavailable(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid secret: {0}")]
    Secret(#[from] CryptoError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

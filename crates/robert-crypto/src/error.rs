use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid {field} length: expected {expected} bytes, got {got}")]
    InvalidFieldLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Epoch {0} does not fit in the 24-bit EBID epoch field")]
    EpochOutOfRange(u32),

    #[error("Unknown request type: {0:#04x}")]
    UnknownRequestType(u8),

    #[error("Invalid P-256 public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid P-256 secret key")]
    InvalidSecretKey,

    #[error("Encrypted data too short")]
    DataTooShort,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("AES-KW wrap failed: {0}")]
    WrapFailed(String),

    #[error("AES-KW unwrap failed: {0}")]
    UnwrapFailed(String),

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}

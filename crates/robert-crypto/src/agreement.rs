//! Registration key agreement.
//!
//! The client sends a P-256 public key; the server combines it with its
//! long-term P-256 key (ECDH) and both sides derive:
//!
//! K_A  = HMAC-SHA256(shared, "mac")     request and HELLO MACs
//! K_EA = HMAC-SHA256(shared, "tuples")  tuple bundle encryption

use hmac::{Hmac, Mac};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePublicKey;
use p256::{PublicKey, SecretKey};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::types::IDENTITY_KEY_LENGTH;

const MAC_KEY_LABEL: &[u8] = b"mac";
const TUPLES_KEY_LABEL: &[u8] = b"tuples";

/// Per-identity secrets derived at registration.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct IdentityKeys {
    /// K_A, authenticates requests and HELLO messages.
    pub key_for_mac: [u8; IDENTITY_KEY_LENGTH],
    /// K_EA, encrypts tuple bundles.
    pub key_for_tuples: [u8; IDENTITY_KEY_LENGTH],
}

impl IdentityKeys {
    /// Derive K_A and K_EA from a raw ECDH shared secret.
    pub fn from_shared_secret(shared: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            key_for_mac: label_key(shared, MAC_KEY_LABEL)?,
            key_for_tuples: label_key(shared, TUPLES_KEY_LABEL)?,
        })
    }
}

fn label_key(shared: &[u8], label: &[u8]) -> Result<[u8; IDENTITY_KEY_LENGTH], CryptoError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(shared).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: IDENTITY_KEY_LENGTH,
            got: shared.len(),
        }
    })?;
    mac.update(label);
    let mut out = [0u8; IDENTITY_KEY_LENGTH];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Parse a P-256 public key given as a SEC1 point (compressed or not) or
/// as an X.509 SubjectPublicKeyInfo DER document.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if let Ok(key) = PublicKey::from_sec1_bytes(bytes) {
        return Ok(key);
    }
    PublicKey::from_public_key_der(bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// P-256 key pair used for registration key agreement.
///
/// The server holds a long-term one; clients generate one per registration.
/// Either side derives the same [`IdentityKeys`] from the peer's public key.
pub struct EcdhKeyPair {
    secret: SecretKey,
}

impl EcdhKeyPair {
    /// Import a 32-byte P-256 scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self { secret })
    }

    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 32];
        loop {
            getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
            // A scalar of zero or above the group order is rejected; draw again.
            if let Ok(secret) = SecretKey::from_slice(&bytes) {
                bytes.zeroize();
                return Ok(Self { secret });
            }
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// Uncompressed SEC1 encoding of the public key.
    pub fn public_key_sec1(&self) -> Vec<u8> {
        self.public_key().to_encoded_point(false).as_bytes().to_vec()
    }

    /// Run ECDH with the peer's public key and derive the identity keys.
    pub fn derive_identity_keys(&self, peer_public_key: &[u8]) -> Result<IdentityKeys, CryptoError> {
        let peer = parse_public_key(peer_public_key)?;
        let shared = p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        IdentityKeys::from_shared_secret(shared.raw_secret_bytes().as_slice())
    }
}

//! # Key Management
//!
//! Ed25519 key material for swarm identities.
//!
//! A swarm node is identified on the overlay by the public half of an
//! Ed25519 keypair. The private half never leaves the node: gossip messages
//! only ever carry [`PublicKey`] values, and two peers are "the same node"
//! exactly when their public keys match.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (ed25519-dalek does this for us).
//! - Key generation uses `OsRng`.
//! - Secret bytes are never logged. `Debug` prints the public key only.

use ed25519_dalek::{SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while loading key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not valid hex")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// A node's private identity key.
///
/// Does NOT implement `Serialize`. Exporting a secret is always an explicit
/// call to [`to_hex`](Self::to_hex) or [`to_bytes`](Self::to_bytes).
///
/// # Examples
///
/// ```
/// use swarm_protocol::crypto::keys::PrivateKey;
///
/// let key = PrivateKey::generate();
/// let restored = PrivateKey::from_hex(&key.to_hex()).unwrap();
/// assert_eq!(key.public_key(), restored.public_key());
/// ```
pub struct PrivateKey {
    signing_key: SigningKey,
}

/// The public half of a node identity. This is the dedup key of the peer
/// table and the value advertised in every gossip message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PrivateKey {
    /// Generate a fresh key using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a key deterministically from a 32-byte seed.
    ///
    /// Handy for tests and for nodes that derive their identity from a
    /// stored secret. A weak seed gives a weak key.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a key from a hex-encoded 32-byte secret.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Returns the public key associated with this private key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.verifying_key().to_bytes(),
        }
    }

    /// Get the underlying `VerifyingKey`.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Exports the raw secret. Don't log it.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    /// Hex-encoded secret, the format `swarm-node keygen` prints and
    /// `swarm-node run --key` accepts.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material, not even partially.
        write!(f, "PrivateKey(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for PrivateKey {
    /// Compared through the public key; identity is what matters here and
    /// comparing secrets in non-constant time is a bad habit.
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for PrivateKey {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

impl PublicKey {
    /// Try to create a `PublicKey` from a byte slice.
    ///
    /// Validates the length and that the bytes decode to an Ed25519 point.
    /// An empty slice is rejected like any other wrong length.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Hex-encoded representation. 64 characters for 32 bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Base58-encoded representation, used for compact log fields.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.bytes).into_string()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

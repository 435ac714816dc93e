//! # Cryptographic Primitives
//!
//! Only key material lives here. The overlay compares identities by public
//! key and does not sign gossip, so there is nothing else to wrap.

pub mod keys;

pub use keys::{KeyError, PrivateKey, PublicKey};

//! # Peer Identity
//!
//! A [`Peer`] pairs a node's public key with the [`Endpoint`] it can be
//! reached at. It is the unit exchanged and compared throughout the gossip
//! protocol: immutable once built, value-equal and hashed on both fields.
//!
//! Note that value equality is stricter than "same node". The peer table
//! deduplicates on the public key alone, so the same node advertised at two
//! endpoints is two distinct `Peer` values but one table entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{INPROC_SCHEME, TCP_SCHEME};
use crate::crypto::keys::{KeyError, PublicKey};

/// Errors raised while building a peer identity from raw input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    /// The key bytes are absent or do not decode to an Ed25519 point.
    #[error("invalid peer public key")]
    InvalidPublicKey,

    /// The endpoint is absent or malformed.
    #[error("invalid endpoint address: {0}")]
    InvalidEndpoint(String),
}

impl From<KeyError> for PeerError {
    fn from(_: KeyError) -> Self {
        Self::InvalidPublicKey
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A validated `scheme://location` address.
///
/// Only the schemes a bundled transport understands are accepted:
/// `inproc://<name>` and `tcp://<host>:<port>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    raw: String,
    scheme_len: usize,
}

impl Endpoint {
    /// Parse and validate an endpoint address.
    pub fn parse(raw: &str) -> Result<Self, PeerError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PeerError::InvalidEndpoint("endpoint is empty".into()));
        }

        let (scheme, location) = raw
            .split_once("://")
            .ok_or_else(|| PeerError::InvalidEndpoint(format!("missing scheme: {raw}")))?;

        if location.is_empty() {
            return Err(PeerError::InvalidEndpoint(format!("missing location: {raw}")));
        }

        match scheme {
            INPROC_SCHEME => {}
            TCP_SCHEME => {
                let (host, port) = location.rsplit_once(':').ok_or_else(|| {
                    PeerError::InvalidEndpoint(format!("tcp endpoint needs host:port: {raw}"))
                })?;
                if host.is_empty() || port.parse::<u16>().is_err() {
                    return Err(PeerError::InvalidEndpoint(format!(
                        "tcp endpoint needs host:port: {raw}"
                    )));
                }
            }
            "" => return Err(PeerError::InvalidEndpoint(format!("missing scheme: {raw}"))),
            other => {
                return Err(PeerError::InvalidEndpoint(format!(
                    "unsupported scheme '{other}'"
                )))
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme_len: scheme.len(),
        })
    }

    /// The scheme, e.g. `"tcp"`.
    pub fn scheme(&self) -> &str {
        &self.raw[..self.scheme_len]
    }

    /// Everything after `://`. For TCP this is `host:port`.
    pub fn location(&self) -> &str {
        &self.raw[self.scheme_len + 3..]
    }

    /// The full address string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Endpoint {
    type Err = PeerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = PeerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.raw
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({})", self.raw)
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// An immutable (public key, endpoint) pair identifying a reachable node.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    public_key: PublicKey,
    endpoint: Endpoint,
}

impl Peer {
    /// Builds a peer from already-validated parts.
    pub fn new(public_key: PublicKey, endpoint: Endpoint) -> Self {
        Self {
            public_key,
            endpoint,
        }
    }

    /// Builds a peer from raw key bytes and an endpoint string. Both are
    /// validated; nothing is constructed on failure.
    pub fn from_parts(key_bytes: &[u8], endpoint: &str) -> Result<Self, PeerError> {
        let public_key = PublicKey::try_from_slice(key_bytes)?;
        let endpoint = Endpoint::parse(endpoint)?;
        Ok(Self::new(public_key, endpoint))
    }

    /// Parses the `<hex public key>@<endpoint>` form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self, PeerError> {
        let (key, endpoint) = s
            .split_once('@')
            .ok_or_else(|| PeerError::InvalidEndpoint(format!("expected key@endpoint: {s}")))?;
        let public_key = PublicKey::from_hex(key)?;
        Ok(Self::new(public_key, Endpoint::parse(endpoint)?))
    }

    /// The node's public key (the peer table's dedup key).
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Where the node can be reached.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// True when both values name the same node, whatever the endpoint.
    pub fn same_node(&self, other: &Peer) -> bool {
        self.public_key == other.public_key
    }
}

impl FromStr for Peer {
    type Err = PeerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.public_key.to_hex(), self.endpoint)
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({:?}@{})", self.public_key, self.endpoint)
    }
}

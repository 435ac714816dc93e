//! # Peer-List Message
//!
//! The only message of the overlay: "here is who I am and who I know".
//! Transports that cross a process boundary encode it with bincode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WIRE_PROTOCOL_VERSION;
use crate::network::peer::Peer;

/// A node's advertisement of itself plus its current peer table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerListMessage {
    /// Wire layout version, see [`WIRE_PROTOCOL_VERSION`].
    pub version: u16,
    /// The advertising node.
    pub sender: Peer,
    /// The sender's peer table at send time. Never contains the sender.
    pub peers: Vec<Peer>,
    /// Sender's clock when the round started. Informational only; receivers
    /// timestamp receipt with their own clock.
    pub sent_at: DateTime<Utc>,
}

impl PeerListMessage {
    /// Builds a message stamped with the current wire version.
    pub fn new(sender: Peer, peers: Vec<Peer>, sent_at: DateTime<Utc>) -> Self {
        Self {
            version: WIRE_PROTOCOL_VERSION,
            sender,
            peers,
            sent_at,
        }
    }

    /// Every identity the message introduces: the sender followed by its
    /// advertised peers.
    pub fn advertised(&self) -> impl Iterator<Item = &Peer> {
        std::iter::once(&self.sender).chain(self.peers.iter())
    }

    /// Serializes for the wire.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Parses a wire payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

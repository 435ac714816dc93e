//! # Peer Table
//!
//! The deduplicated set of peers a swarm node knows about.
//!
//! ## Dedup key
//!
//! Entries are keyed by public key. Adding a peer whose key is already
//! present is a silent no-op, even when the new value carries a different
//! endpoint: the first-seen endpoint wins until the entry is gone (which,
//! since the overlay never evicts, means for the life of the node).
//!
//! ## Self-exclusion
//!
//! The table knows its owner's public key and refuses to hold it. This is
//! enforced here rather than at every call site so no merge path can forget.
//!
//! `PeerTable` itself is not synchronized. The owning swarm keeps it behind
//! its node-local lock.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::crypto::keys::PublicKey;
use crate::network::peer::Peer;

/// Failures of [`PeerTable::copy_to`]. All are raised before anything is
/// written, so a failed copy leaves the destination untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// No destination buffer was supplied.
    #[error("destination must not be null")]
    NullDestination,

    /// The start index is negative.
    #[error("start index {index} is out of range")]
    IndexOutOfRange {
        /// The rejected index.
        index: isize,
    },

    /// The destination cannot hold every member from the start index on.
    #[error("destination too small: need {required} slots, have {available}")]
    InsufficientCapacity {
        /// `start_index + len()`.
        required: usize,
        /// `destination.len()`.
        available: usize,
    },
}

/// A set of peers deduplicated by public key, never containing its owner.
#[derive(Debug, Clone)]
pub struct PeerTable {
    owner: PublicKey,
    entries: HashMap<PublicKey, Peer>,
}

impl PeerTable {
    /// Creates an empty table owned by the node with the given key.
    pub fn new(owner: PublicKey) -> Self {
        Self {
            owner,
            entries: HashMap::new(),
        }
    }

    /// The owning node's key.
    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    /// Adds a peer. Returns `true` if the table changed.
    ///
    /// The owner and already-known keys are ignored without error.
    pub fn add(&mut self, peer: Peer) -> bool {
        if *peer.public_key() == self.owner {
            return false;
        }
        if self.entries.contains_key(peer.public_key()) {
            return false;
        }
        self.entries.insert(*peer.public_key(), peer);
        true
    }

    /// Adds every peer in `peers` under the same rules as [`add`](Self::add).
    /// Returns how many were new.
    pub fn merge<I>(&mut self, peers: I) -> usize
    where
        I: IntoIterator<Item = Peer>,
    {
        let mut added = 0;
        for peer in peers {
            if self.add(peer) {
                added += 1;
            }
        }
        added
    }

    /// Membership by public key.
    pub fn contains(&self, peer: &Peer) -> bool {
        self.entries.contains_key(peer.public_key())
    }

    /// The stored entry for a node, with the endpoint it was first seen at.
    pub fn get(&self, key: &PublicKey) -> Option<&Peer> {
        self.entries.get(key)
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no peers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all peers in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.entries.values()
    }

    /// Copies every member into `destination` starting at `start_index`.
    ///
    /// Slots outside `start_index..start_index + len()` are left as they
    /// were. The order of the copied members is unspecified.
    pub fn copy_to(
        &self,
        destination: Option<&mut [Option<Peer>]>,
        start_index: isize,
    ) -> Result<(), CollectionError> {
        let destination = destination.ok_or(CollectionError::NullDestination)?;
        let start = usize::try_from(start_index)
            .map_err(|_| CollectionError::IndexOutOfRange { index: start_index })?;

        let required = start.saturating_add(self.len());
        if required > destination.len() {
            return Err(CollectionError::InsufficientCapacity {
                required,
                available: destination.len(),
            });
        }

        for (slot, peer) in destination[start..required].iter_mut().zip(self.iter()) {
            *slot = Some(peer.clone());
        }
        Ok(())
    }

    /// Snapshot of the members as a set of values.
    pub fn to_set(&self) -> HashSet<Peer> {
        self.entries.values().cloned().collect()
    }

    /// Snapshot of the members as a vector.
    pub fn to_vec(&self) -> Vec<Peer> {
        self.entries.values().cloned().collect()
    }
}

impl PartialEq for PeerTable {
    /// Tables are equal when they hold the same peer values. The owner is
    /// not part of the comparison; node identity is compared separately.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(key, peer)| other.entries.get(key) == Some(peer))
    }
}

impl Eq for PeerTable {}

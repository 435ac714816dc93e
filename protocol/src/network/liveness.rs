//! # Liveness Tracking
//!
//! Recency bookkeeping for a swarm node:
//!
//! - [`LivenessTracker`] maps each peer that has sent us a peer list to the
//!   time we last received from it.
//! - [`RoundClock`] holds the node-wide `last_distributed` / `last_received`
//!   timestamps.
//!
//! Both only move forward. An update with a clock reading older than the
//! stored value (wall clocks do step backwards) keeps the stored value.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::network::peer::Peer;

/// Per-peer last-contact timestamps.
#[derive(Debug, Clone, Default)]
pub struct LivenessTracker {
    last_seen: HashMap<Peer, DateTime<Utc>>,
}

impl LivenessTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records contact with `peer` at `at`, creating or advancing its entry.
    pub fn record(&mut self, peer: Peer, at: DateTime<Utc>) {
        let entry = self.last_seen.entry(peer).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }

    /// Last contact with `peer`.
    ///
    /// Looks up the exact identity first. A node may have advertised itself
    /// at a different endpoint than the one the caller holds, so when there
    /// is no exact entry the most recent entry with the same public key is
    /// returned instead.
    pub fn last_seen(&self, peer: &Peer) -> Option<DateTime<Utc>> {
        if let Some(at) = self.last_seen.get(peer) {
            return Some(*at);
        }
        self.last_seen
            .iter()
            .filter(|(known, _)| known.same_node(peer))
            .map(|(_, at)| *at)
            .max()
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    /// True when nothing has been received yet.
    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    /// Iterates over `(peer, last contact)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&Peer, &DateTime<Utc>)> {
        self.last_seen.iter()
    }

    /// Owned copy of the whole map.
    pub fn snapshot(&self) -> HashMap<Peer, DateTime<Utc>> {
        self.last_seen.clone()
    }
}

/// Node-wide round timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundClock {
    last_distributed: DateTime<Utc>,
    last_received: DateTime<Utc>,
}

impl RoundClock {
    /// `last_distributed` starts at the given seed, everything else at the
    /// Unix epoch.
    pub fn new(last_distributed: Option<DateTime<Utc>>) -> Self {
        Self {
            last_distributed: last_distributed.unwrap_or_default(),
            last_received: DateTime::<Utc>::default(),
        }
    }

    /// Completion time of the latest distribute round.
    pub fn last_distributed(&self) -> DateTime<Utc> {
        self.last_distributed
    }

    /// Time of the latest receipt.
    pub fn last_received(&self) -> DateTime<Utc> {
        self.last_received
    }

    /// Advances `last_distributed` to `now` and returns the stored value.
    pub fn mark_distributed(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.last_distributed = self.last_distributed.max(now);
        self.last_distributed
    }

    /// Advances `last_received` to `now` and returns the stored value.
    pub fn mark_received(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.last_received = self.last_received.max(now);
        self.last_received
    }
}

//! # Protocol Configuration & Constants
//!
//! Every tunable number of the overlay lives here. [`SwarmConfig`] bundles
//! the per-node knobs so a node binary can load them from flags or a file;
//! the constants are the defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The crate-independent protocol version reported by nodes.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Wire protocol version carried in every peer-list message. Bump when the
/// message layout changes.
pub const WIRE_PROTOCOL_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Endpoint Schemes
// ---------------------------------------------------------------------------

/// Process-local medium. Endpoints look like `inproc://node-a`.
pub const INPROC_SCHEME: &str = "inproc";

/// TCP medium. Endpoints look like `tcp://127.0.0.1:9750`.
pub const TCP_SCHEME: &str = "tcp";

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Default delay between two distribute rounds.
pub const DEFAULT_ROUND_INTERVAL: Duration = Duration::from_millis(3_000);

/// Default bound on a single peer send. A peer that does not accept the
/// message in time counts as a failed delivery for that round.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(3_000);

// ---------------------------------------------------------------------------
// Transport Limits
// ---------------------------------------------------------------------------

/// Capacity of the inbound message queue of a bound endpoint. Senders
/// wait (bounded by the send timeout) when the receiver falls behind.
pub const INBOX_CAPACITY: usize = 256;

/// Largest accepted TCP frame. A peer list is a few dozen bytes per entry,
/// so 1 MiB covers tens of thousands of peers.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Node Binary Defaults
// ---------------------------------------------------------------------------

/// Default gossip listen port for `swarm-node run`.
pub const DEFAULT_GOSSIP_PORT: u16 = 9750;

/// Default HTTP port for the status and metrics API.
pub const DEFAULT_HTTP_PORT: u16 = 9751;

// ---------------------------------------------------------------------------
// SwarmConfig
// ---------------------------------------------------------------------------

/// Per-node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Endpoint this node binds and advertises, e.g. `tcp://10.0.0.5:9750`.
    pub endpoint: String,
    /// Delay between distribute rounds, in milliseconds.
    pub round_interval_ms: u64,
    /// Bound on each individual send, in milliseconds.
    pub send_timeout_ms: u64,
}

impl SwarmConfig {
    /// Round interval as a `Duration`.
    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.round_interval_ms)
    }

    /// Send timeout as a `Duration`.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            endpoint: format!("{}://127.0.0.1:{}", TCP_SCHEME, DEFAULT_GOSSIP_PORT),
            round_interval_ms: DEFAULT_ROUND_INTERVAL.as_millis() as u64,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT.as_millis() as u64,
        }
    }
}

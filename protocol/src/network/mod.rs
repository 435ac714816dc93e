//! # Network Module
//!
//! Peer discovery and liveness gossip. Every node periodically tells every
//! peer it knows about "me plus everyone I know"; receivers merge what they
//! hear. Tables converge to the full membership of each connected group
//! without any central registry.
//!
//! ## Architecture
//!
//! ```text
//! peer.rs        Endpoint and Peer identity (public key + address)
//! peer_table.rs  Known peers keyed by public key, owner excluded
//! liveness.rs    Last-contact times per peer, round timestamps
//! signal.rs      Wakes waiters after each distribute/receive
//! message.rs     The peer-list message and its wire encoding
//! transport.rs   Transport trait and errors
//! inproc.rs      In-process transport (inproc://)
//! tcp.rs         TCP transport (tcp://host:port)
//! swarm.rs       The gossip node: lifecycle, rounds, merging
//! ```
//!
//! ## Design Decisions
//!
//! - Peer identity is the public key. Two peers with the same key and
//!   different endpoints are the same node; the table keeps whichever
//!   endpoint it saw first.
//! - Nodes are never evicted. The liveness tracker records when each peer
//!   was last heard from and leaves the interpretation to callers.
//! - Per-node state lives behind a single `parking_lot::RwLock`, held only
//!   for in-memory work. Sends run on a snapshot outside the lock.

pub mod inproc;
pub mod liveness;
pub mod message;
pub mod peer;
pub mod peer_table;
pub mod signal;
pub mod swarm;
pub mod tcp;
pub mod transport;

pub use inproc::InProcTransport;
pub use liveness::{LivenessTracker, RoundClock};
pub use message::PeerListMessage;
pub use peer::{Endpoint, Peer, PeerError};
pub use peer_table::{CollectionError, PeerTable};
pub use signal::RoundSignal;
pub use swarm::{RoundReport, Swarm, SwarmBuilder, SwarmError, SwarmStats, SwarmStatus};
pub use tcp::TcpTransport;
pub use transport::{default_transport, Inbox, Transport, TransportError};

// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Swarm Protocol: Core Library
//!
//! A small peer-discovery overlay. Each node knows its own identity and a
//! few seed peers; periodic peer-list gossip spreads membership until every
//! node in a connected group knows every other one, and each node keeps a
//! record of when it last heard from whom.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys. A node's public key is its identity.
//! - **network**: Peers, the peer table, liveness, transports and the
//!   [`Swarm`](network::Swarm) gossip node itself.
//! - **config**: Protocol constants and node settings.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use swarm_protocol::crypto::PrivateKey;
//! use swarm_protocol::network::{Endpoint, Swarm};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let a = Swarm::new(PrivateKey::generate(), Endpoint::parse("inproc://a")?, Duration::from_secs(1))?;
//! let b = Swarm::new(PrivateKey::generate(), Endpoint::parse("inproc://b")?, Duration::from_secs(1))?;
//! a.init_context().await?;
//! b.init_context().await?;
//! a.add_peers([b.as_peer()])?;
//!
//! let runner = a.clone();
//! tokio::spawn(async move { runner.run(Duration::from_millis(500)).await });
//! b.received_signal().wait_for_generation(1).await;
//! assert!(b.contains(&a.as_peer()));
//!
//! a.dispose().await;
//! b.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod network;

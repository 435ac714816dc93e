//! # Swarm
//!
//! A `Swarm` is one node of the peer-discovery overlay. It owns the node's
//! identity, its [`PeerTable`], its [`LivenessTracker`], the two round
//! signals and a [`Transport`] handle, and drives the gossip protocol:
//!
//! - **Distribute** (periodic): send "me + everyone I know" to everyone I
//!   know. Individual send failures are logged and counted, never fatal.
//! - **Receive** (on arrival): union the sender and its advertised peers
//!   into the table, stamp the sender's liveness entry.
//!
//! Repeating both converges every connected node's table to the set of all
//! other nodes, including peers nobody introduced directly.
//!
//! ## Lifecycle
//!
//! ```text
//! new() -> init_context() -> run(interval) ... -> dispose()
//! Created   Initialized      Running              Disposed
//! ```
//!
//! `add_peers` works in both `Initialized` and `Running`. `dispose` stops the
//! round loop, sends one farewell round so peers record our last contact,
//! then releases the transport. Peers that learned about us keep us in
//! their tables: the overlay does not evict.
//!
//! ## Locking
//!
//! Table, tracker and round timestamps sit behind one `parking_lot::RwLock`.
//! It is only ever held for in-memory work, never across an `.await`. Sends
//! work on a snapshot taken under the lock.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::{SwarmConfig, DEFAULT_SEND_TIMEOUT, WIRE_PROTOCOL_VERSION};
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::network::liveness::{LivenessTracker, RoundClock};
use crate::network::message::PeerListMessage;
use crate::network::peer::{Endpoint, Peer, PeerError};
use crate::network::peer_table::{CollectionError, PeerTable};
use crate::network::signal::RoundSignal;
use crate::network::transport::{default_transport, Inbox, Transport, TransportError};

// ---------------------------------------------------------------------------
// Status & Errors
// ---------------------------------------------------------------------------

/// Lifecycle state of a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwarmStatus {
    /// Constructed; no transport yet.
    Created,
    /// Transport bound and inbound handling active.
    Initialized,
    /// Round loop active (inbound handling too).
    Running,
    /// Terminal. Loop stopped, transport released.
    Disposed,
}

impl SwarmStatus {
    /// True once the transport is bound and until disposal.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Initialized | Self::Running)
    }
}

/// Errors returned by swarm operations.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// The operation needs a bound transport; call `init_context` first.
    #[error("swarm is not initialized")]
    NotReady,

    /// The swarm has been disposed.
    #[error("swarm is disposed")]
    Disposed,

    /// `run` was called while another `run` is active.
    #[error("round loop already running")]
    AlreadyRunning,

    /// The configured identity is malformed.
    #[error(transparent)]
    Peer(#[from] PeerError),

    /// Binding the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Outcome of one distribute round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    /// Peers a send was attempted to.
    pub attempted: usize,
    /// Sends the transport accepted.
    pub delivered: usize,
    /// Sends that failed or timed out.
    pub failed: usize,
    /// `last_distributed` after the round.
    pub completed_at: DateTime<Utc>,
}

/// Cumulative counters, mainly for metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmStats {
    /// Completed distribute rounds, farewell included.
    pub rounds: u64,
    /// Successful peer sends.
    pub sends_delivered: u64,
    /// Failed or timed-out peer sends.
    pub sends_failed: u64,
    /// Peer-list messages merged.
    pub messages_received: u64,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures a [`Swarm`] before construction.
pub struct SwarmBuilder {
    key: PrivateKey,
    endpoint: Endpoint,
    send_timeout: Duration,
    transport: Option<Arc<dyn Transport>>,
    last_distributed: Option<DateTime<Utc>>,
}

impl SwarmBuilder {
    /// Bound on each individual send.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Uses `transport` instead of the default for the endpoint's scheme.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Pre-seeds `last_distributed`, e.g. when restoring a node.
    pub fn last_distributed(mut self, at: DateTime<Utc>) -> Self {
        self.last_distributed = Some(at);
        self
    }

    /// Builds the swarm in `Created` state.
    pub fn build(self) -> Result<Swarm, SwarmError> {
        let transport = match self.transport {
            Some(ref transport) => Arc::clone(transport),
            None => default_transport(&self.endpoint)?,
        };
        Ok(self.assemble(transport))
    }

    fn assemble(self, transport: Arc<dyn Transport>) -> Swarm {
        let peer = Peer::new(self.key.public_key(), self.endpoint);
        let (shutdown, _) = watch::channel(false);
        let (loop_active, _) = watch::channel(false);

        info!(node = %peer, "creating swarm");

        Swarm {
            inner: Arc::new(SwarmInner {
                state: RwLock::new(PeerState {
                    table: PeerTable::new(*peer.public_key()),
                    liveness: LivenessTracker::new(),
                    clock: RoundClock::new(self.last_distributed),
                }),
                key: self.key,
                peer,
                send_timeout: self.send_timeout,
                transport,
                lifecycle: Mutex::new(Lifecycle {
                    status: SwarmStatus::Created,
                    inbound: None,
                }),
                transition: tokio::sync::Mutex::new(()),
                distributed: RoundSignal::new(),
                received: RoundSignal::new(),
                shutdown,
                loop_active,
                counters: Counters::default(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// Everything the node-local lock protects.
struct PeerState {
    table: PeerTable,
    liveness: LivenessTracker,
    clock: RoundClock,
}

struct Lifecycle {
    status: SwarmStatus,
    inbound: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Counters {
    rounds: AtomicU64,
    sends_delivered: AtomicU64,
    sends_failed: AtomicU64,
    messages_received: AtomicU64,
}

struct SwarmInner {
    key: PrivateKey,
    peer: Peer,
    send_timeout: Duration,
    transport: Arc<dyn Transport>,
    state: RwLock<PeerState>,
    lifecycle: Mutex<Lifecycle>,
    /// Serializes `init_context` and `dispose`.
    transition: tokio::sync::Mutex<()>,
    distributed: RoundSignal,
    received: RoundSignal,
    shutdown: watch::Sender<bool>,
    loop_active: watch::Sender<bool>,
    counters: Counters,
}

impl SwarmInner {
    fn status(&self) -> SwarmStatus {
        self.lifecycle.lock().status
    }

    fn require_ready(&self) -> Result<(), SwarmError> {
        match self.status() {
            SwarmStatus::Created => Err(SwarmError::NotReady),
            SwarmStatus::Disposed => Err(SwarmError::Disposed),
            SwarmStatus::Initialized | SwarmStatus::Running => Ok(()),
        }
    }

    /// One distribute round against a snapshot of the table.
    async fn distribute_round(&self) -> RoundReport {
        let (targets, message) = {
            let state = self.state.read();
            let peers = state.table.to_vec();
            let message = PeerListMessage::new(self.peer.clone(), peers.clone(), Utc::now());
            (peers, message)
        };

        let timeout = self.send_timeout;
        let sends = targets.iter().map(|target| {
            let message = &message;
            async move {
                let endpoint = target.endpoint();
                let send = tokio::time::timeout(timeout, self.transport.send(endpoint, message));
                let result = match AssertUnwindSafe(send).catch_unwind().await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(TransportError::Timeout {
                        endpoint: endpoint.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                    Err(_) => Err(TransportError::Panicked(endpoint.to_string())),
                };
                (target, result)
            }
        });

        let mut delivered = 0;
        let mut failed = 0;
        for (target, result) in join_all(sends).await {
            match result {
                Ok(()) => delivered += 1,
                Err(err) => {
                    failed += 1;
                    debug!(node = %self.peer.endpoint(), peer = %target, error = %err, "peer send failed");
                }
            }
        }

        let completed_at = self.state.write().clock.mark_distributed(Utc::now());
        self.counters.rounds.fetch_add(1, Ordering::Relaxed);
        self.counters
            .sends_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.counters
            .sends_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
        self.distributed.fire();

        if failed > 0 {
            warn!(
                node = %self.peer.endpoint(),
                attempted = targets.len(),
                failed,
                "distribute round had failed sends"
            );
        } else {
            trace!(node = %self.peer.endpoint(), attempted = targets.len(), "distribute round complete");
        }

        RoundReport {
            attempted: targets.len(),
            delivered,
            failed,
            completed_at,
        }
    }

    /// Merges one inbound peer list. Returns false if the message was dropped.
    fn receive(&self, message: PeerListMessage) -> bool {
        if message.version != WIRE_PROTOCOL_VERSION {
            warn!(
                node = %self.peer.endpoint(),
                version = message.version,
                "dropping peer list with unknown wire version"
            );
            return false;
        }
        if message.sender.same_node(&self.peer) {
            trace!(node = %self.peer.endpoint(), "ignoring peer list from ourselves");
            return false;
        }

        let now = Utc::now();
        let added = {
            let mut state = self.state.write();
            let added = state.table.merge(message.advertised().cloned());
            state.liveness.record(message.sender.clone(), now);
            state.clock.mark_received(now);
            added
        };
        self.counters.messages_received.fetch_add(1, Ordering::Relaxed);
        self.received.fire();

        if added > 0 {
            info!(node = %self.peer.endpoint(), from = %message.sender, added, "learned new peers");
        } else {
            trace!(node = %self.peer.endpoint(), from = %message.sender, "peer list merged");
        }
        true
    }
}

impl Drop for SwarmInner {
    fn drop(&mut self) {
        if let Some(inbound) = self.lifecycle.get_mut().inbound.take() {
            inbound.abort();
        }
    }
}

async fn inbound_loop(swarm: Weak<SwarmInner>, mut inbox: Inbox) {
    while let Some(message) = inbox.recv().await {
        let Some(swarm) = swarm.upgrade() else {
            break;
        };
        swarm.receive(message);
    }
}

/// Resets the loop flags when `run` exits, including when its future is
/// dropped mid-round.
struct LoopGuard<'a> {
    inner: &'a SwarmInner,
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.status == SwarmStatus::Running {
                lifecycle.status = SwarmStatus::Initialized;
            }
        }
        self.inner.loop_active.send_replace(false);
    }
}

// ---------------------------------------------------------------------------
// Swarm
// ---------------------------------------------------------------------------

/// A gossip node. Cheap to clone; clones share the same node.
#[derive(Clone)]
pub struct Swarm {
    inner: Arc<SwarmInner>,
}

impl Swarm {
    /// Starts configuring a swarm for `key` reachable at `endpoint`.
    pub fn builder(key: PrivateKey, endpoint: Endpoint) -> SwarmBuilder {
        SwarmBuilder {
            key,
            endpoint,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            transport: None,
            last_distributed: None,
        }
    }

    /// A swarm on the default transport for the endpoint's scheme.
    pub fn new(key: PrivateKey, endpoint: Endpoint, send_timeout: Duration) -> Result<Self, SwarmError> {
        Self::builder(key, endpoint).send_timeout(send_timeout).build()
    }

    /// A swarm on an explicit transport.
    pub fn with_transport(
        key: PrivateKey,
        endpoint: Endpoint,
        send_timeout: Duration,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::builder(key, endpoint)
            .send_timeout(send_timeout)
            .assemble(transport)
    }

    /// A swarm from a [`SwarmConfig`].
    pub fn from_config(key: PrivateKey, config: &SwarmConfig) -> Result<Self, SwarmError> {
        let endpoint = Endpoint::parse(&config.endpoint)?;
        Self::new(key, endpoint, config.send_timeout())
    }

    // -- identity -----------------------------------------------------------

    /// This node as a peer identity.
    pub fn as_peer(&self) -> Peer {
        self.inner.peer.clone()
    }

    /// This node's public key.
    pub fn public_key(&self) -> PublicKey {
        self.inner.key.public_key()
    }

    /// This node's endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        self.inner.peer.endpoint()
    }

    /// Bound on each individual send.
    pub fn send_timeout(&self) -> Duration {
        self.inner.send_timeout
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SwarmStatus {
        self.inner.status()
    }

    // -- collection surface -------------------------------------------------

    /// Adds a peer directly. Self and known keys are ignored. Does not need
    /// an initialized transport.
    pub fn add(&self, peer: Peer) -> bool {
        self.inner.state.write().table.add(peer)
    }

    /// Membership by public key.
    pub fn contains(&self, peer: &Peer) -> bool {
        self.inner.state.read().table.contains(peer)
    }

    /// Number of known peers.
    pub fn count(&self) -> usize {
        self.inner.state.read().table.len()
    }

    /// True when no peers are known.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Copies a consistent snapshot of the table into `destination`.
    /// See [`PeerTable::copy_to`].
    pub fn copy_to(
        &self,
        destination: Option<&mut [Option<Peer>]>,
        start_index: isize,
    ) -> Result<(), CollectionError> {
        self.inner.state.read().table.copy_to(destination, start_index)
    }

    /// Snapshot of the known peers, unspecified order.
    pub fn peers(&self) -> Vec<Peer> {
        self.inner.state.read().table.to_vec()
    }

    /// Snapshot of the known peers as a set.
    pub fn peer_set(&self) -> HashSet<Peer> {
        self.inner.state.read().table.to_set()
    }

    // -- observables --------------------------------------------------------

    /// Completion time of the latest distribute round.
    pub fn last_distributed(&self) -> DateTime<Utc> {
        self.inner.state.read().clock.last_distributed()
    }

    /// Time of the latest merged peer list.
    pub fn last_received(&self) -> DateTime<Utc> {
        self.inner.state.read().clock.last_received()
    }

    /// Snapshot of the liveness tracker.
    pub fn liveness(&self) -> HashMap<Peer, DateTime<Utc>> {
        self.inner.state.read().liveness.snapshot()
    }

    /// Last receipt from `peer`, falling back to a public-key match.
    pub fn last_seen(&self, peer: &Peer) -> Option<DateTime<Utc>> {
        self.inner.state.read().liveness.last_seen(peer)
    }

    /// Fires after every distribute round.
    pub fn distributed_signal(&self) -> &RoundSignal {
        &self.inner.distributed
    }

    /// Fires after every merged peer list.
    pub fn received_signal(&self) -> &RoundSignal {
        &self.inner.received
    }

    /// Cumulative counters.
    pub fn stats(&self) -> SwarmStats {
        let counters = &self.inner.counters;
        SwarmStats {
            rounds: counters.rounds.load(Ordering::Relaxed),
            sends_delivered: counters.sends_delivered.load(Ordering::Relaxed),
            sends_failed: counters.sends_failed.load(Ordering::Relaxed),
            messages_received: counters.messages_received.load(Ordering::Relaxed),
        }
    }

    // -- equality -----------------------------------------------------------

    /// Same public key and endpoint, whatever the tables hold.
    pub fn key_equals(&self, other: &Swarm) -> bool {
        self.inner.peer == other.inner.peer
    }

    /// `key_equals` plus identical peer tables.
    pub fn value_equals(&self, other: &Swarm) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        // Snapshot one side at a time; never hold both locks.
        self.key_equals(other) && self.peer_set() == other.peer_set()
    }

    // -- lifecycle ----------------------------------------------------------

    /// Binds the transport and starts inbound handling.
    ///
    /// A second call while initialized or running does nothing.
    pub async fn init_context(&self) -> Result<(), SwarmError> {
        let _transition = self.inner.transition.lock().await;
        match self.status() {
            SwarmStatus::Disposed => return Err(SwarmError::Disposed),
            SwarmStatus::Initialized | SwarmStatus::Running => return Ok(()),
            SwarmStatus::Created => {}
        }

        let inbox = self.inner.transport.bind(self.endpoint()).await?;
        let inbound = tokio::spawn(inbound_loop(Arc::downgrade(&self.inner), inbox));

        {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.inbound = Some(inbound);
            lifecycle.status = SwarmStatus::Initialized;
        }
        info!(node = %self.inner.peer, "swarm initialized");
        Ok(())
    }

    /// Seeds the table with known peers. Returns how many were new.
    pub fn add_peers<I>(&self, peers: I) -> Result<usize, SwarmError>
    where
        I: IntoIterator<Item = Peer>,
    {
        self.inner.require_ready()?;
        let added = self.inner.state.write().table.merge(peers);
        debug!(node = %self.endpoint(), added, "peers added");
        Ok(added)
    }

    /// Runs one distribute round now.
    pub async fn distribute(&self) -> Result<RoundReport, SwarmError> {
        self.inner.require_ready()?;
        Ok(self.inner.distribute_round().await)
    }

    /// Runs the round loop until [`dispose`](Self::dispose).
    ///
    /// The first round starts immediately, then one every `interval`. A
    /// round that panics is logged and the loop carries on. Returns `Ok(())`
    /// once disposal stops it.
    pub async fn run(&self, interval: Duration) -> Result<(), SwarmError> {
        let mut shutdown = self.inner.shutdown.subscribe();
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.status {
                SwarmStatus::Created => return Err(SwarmError::NotReady),
                SwarmStatus::Disposed => return Err(SwarmError::Disposed),
                SwarmStatus::Running => return Err(SwarmError::AlreadyRunning),
                SwarmStatus::Initialized => lifecycle.status = SwarmStatus::Running,
            }
            self.inner.loop_active.send_replace(true);
        }
        let _guard = LoopGuard { inner: &self.inner };

        info!(node = %self.inner.peer, interval_ms = interval.as_millis() as u64, "round loop starting");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let round = AssertUnwindSafe(self.inner.distribute_round()).catch_unwind();
            tokio::select! {
                outcome = round => {
                    if outcome.is_err() {
                        warn!(node = %self.endpoint(), "round panicked, continuing with next interval");
                    }
                }
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(node = %self.inner.peer, "round loop stopped");
        Ok(())
    }

    /// Stops the swarm for good.
    ///
    /// Cancels the round loop and waits for it to exit, sends a farewell
    /// round, stops inbound handling and releases the transport. Later calls
    /// return immediately.
    pub async fn dispose(&self) {
        let _transition = self.inner.transition.lock().await;
        let previous = {
            let mut lifecycle = self.inner.lifecycle.lock();
            let previous = lifecycle.status;
            lifecycle.status = SwarmStatus::Disposed;
            previous
        };
        if previous == SwarmStatus::Disposed {
            return;
        }

        info!(node = %self.inner.peer, "disposing swarm");
        self.inner.shutdown.send_replace(true);

        let mut loop_active = self.inner.loop_active.subscribe();
        let _ = loop_active.wait_for(|active| !*active).await;

        if previous == SwarmStatus::Created {
            return;
        }

        match AssertUnwindSafe(self.inner.distribute_round())
            .catch_unwind()
            .await
        {
            Ok(farewell) => debug!(
                node = %self.endpoint(),
                attempted = farewell.attempted,
                delivered = farewell.delivered,
                "farewell round sent"
            ),
            Err(_) => warn!(node = %self.endpoint(), "farewell round panicked"),
        }

        let inbound = self.inner.lifecycle.lock().inbound.take();
        if let Some(inbound) = inbound {
            inbound.abort();
            let _ = inbound.await;
        }
        self.inner.transport.unbind(self.endpoint()).await;
        info!(node = %self.inner.peer, "swarm disposed");
    }
}

impl PartialEq for Swarm {
    fn eq(&self, other: &Self) -> bool {
        self.value_equals(other)
    }
}

impl fmt::Debug for Swarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Swarm")
            .field("peer", &self.inner.peer)
            .field("status", &self.status())
            .field("peers", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::inproc::InProcTransport;

    fn endpoint(name: &str) -> Endpoint {
        Endpoint::parse(&format!("inproc://{name}")).unwrap()
    }

    fn swarm_on(transport: &InProcTransport, name: &str) -> Swarm {
        Swarm::with_transport(
            PrivateKey::generate(),
            endpoint(name),
            Duration::from_millis(500),
            Arc::new(transport.clone()),
        )
    }

    #[test]
    fn new_swarm_is_created_and_empty() {
        let swarm = swarm_on(&InProcTransport::new(), "a");
        assert_eq!(swarm.status(), SwarmStatus::Created);
        assert!(swarm.is_empty());
        assert_eq!(swarm.last_distributed(), DateTime::<Utc>::default());
        assert_eq!(swarm.last_received(), DateTime::<Utc>::default());
    }

    #[test]
    fn builder_seeds_last_distributed() {
        let seed = Utc::now();
        let swarm = Swarm::builder(PrivateKey::generate(), endpoint("seeded"))
            .transport(Arc::new(InProcTransport::new()))
            .last_distributed(seed)
            .build()
            .unwrap();
        assert_eq!(swarm.last_distributed(), seed);
    }

    #[test]
    fn from_config_rejects_bad_endpoint() {
        let config = SwarmConfig {
            endpoint: "nowhere".into(),
            ..SwarmConfig::default()
        };
        assert!(matches!(
            Swarm::from_config(PrivateKey::generate(), &config),
            Err(SwarmError::Peer(PeerError::InvalidEndpoint(_)))
        ));
    }

    #[test]
    fn add_ignores_self() {
        let swarm = swarm_on(&InProcTransport::new(), "a");
        assert!(!swarm.add(swarm.as_peer()));
        assert!(swarm.is_empty());
    }

    #[tokio::test]
    async fn operations_before_init_are_not_ready() {
        let transport = InProcTransport::new();
        let a = swarm_on(&transport, "a");
        let b = swarm_on(&transport, "b");

        assert!(matches!(a.add_peers(vec![b.as_peer()]), Err(SwarmError::NotReady)));
        assert!(matches!(a.distribute().await, Err(SwarmError::NotReady)));
        assert!(matches!(
            a.run(Duration::from_millis(10)).await,
            Err(SwarmError::NotReady)
        ));
        assert_eq!(a.status(), SwarmStatus::Created);
        assert!(a.is_empty());
    }

    #[tokio::test]
    async fn init_context_is_idempotent() {
        let transport = InProcTransport::new();
        let a = swarm_on(&transport, "a");
        a.init_context().await.unwrap();
        a.init_context().await.unwrap();
        assert_eq!(a.status(), SwarmStatus::Initialized);
        assert!(transport.is_bound(a.endpoint()));
        a.dispose().await;
    }

    #[tokio::test]
    async fn receive_merges_sender_and_its_peers() {
        let transport = InProcTransport::new();
        let a = swarm_on(&transport, "a");
        let b = swarm_on(&transport, "b");
        let c = swarm_on(&transport, "c");

        // b advertises a (us) and c.
        let message = PeerListMessage::new(b.as_peer(), vec![a.as_peer(), c.as_peer()], Utc::now());
        assert!(a.inner.receive(message));

        assert_eq!(a.peer_set(), HashSet::from([b.as_peer(), c.as_peer()]));
        assert!(!a.contains(&a.as_peer()));
        assert!(a.last_seen(&b.as_peer()).is_some());
        assert!(a.last_seen(&c.as_peer()).is_none());
        assert_eq!(a.received_signal().generation(), 1);
        assert_eq!(a.stats().messages_received, 1);
    }

    #[tokio::test]
    async fn messages_from_self_are_dropped() {
        let transport = InProcTransport::new();
        let a = swarm_on(&transport, "a");
        let message = PeerListMessage::new(a.as_peer(), vec![], Utc::now());
        assert!(!a.inner.receive(message));
        assert_eq!(a.received_signal().generation(), 0);
        assert_eq!(a.last_received(), DateTime::<Utc>::default());
    }

    #[tokio::test]
    async fn unknown_wire_version_is_dropped() {
        let transport = InProcTransport::new();
        let a = swarm_on(&transport, "a");
        let b = swarm_on(&transport, "b");
        let mut message = PeerListMessage::new(b.as_peer(), vec![], Utc::now());
        message.version = WIRE_PROTOCOL_VERSION + 1;
        assert!(!a.inner.receive(message));
        assert!(a.is_empty());
    }

    #[tokio::test]
    async fn distribute_counts_failures_without_aborting() {
        let transport = InProcTransport::new();
        let a = swarm_on(&transport, "a");
        let b = swarm_on(&transport, "b");
        let ghost = swarm_on(&transport, "ghost");
        a.init_context().await.unwrap();
        b.init_context().await.unwrap();

        a.add_peers(vec![b.as_peer(), ghost.as_peer()]).unwrap();
        let before = a.last_distributed();
        let report = a.distribute().await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert!(report.completed_at > before);
        assert_eq!(a.distributed_signal().generation(), 1);

        a.dispose().await;
        b.dispose().await;
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let transport = InProcTransport::new();
        let a = swarm_on(&transport, "a");
        a.init_context().await.unwrap();

        let runner = {
            let a = a.clone();
            tokio::spawn(async move { a.run(Duration::from_millis(20)).await })
        };
        a.distributed_signal().wait_for_generation(1).await;
        assert_eq!(a.status(), SwarmStatus::Running);
        assert!(matches!(
            a.run(Duration::from_millis(20)).await,
            Err(SwarmError::AlreadyRunning)
        ));

        a.dispose().await;
        assert!(runner.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn dispose_twice_is_a_noop() {
        let transport = InProcTransport::new();
        let a = swarm_on(&transport, "a");
        a.init_context().await.unwrap();

        a.dispose().await;
        a.dispose().await;

        assert_eq!(a.status(), SwarmStatus::Disposed);
        assert!(!transport.is_bound(a.endpoint()));
        assert!(matches!(a.init_context().await, Err(SwarmError::Disposed)));
        assert!(matches!(a.add_peers(vec![]), Err(SwarmError::Disposed)));
    }

    #[tokio::test]
    async fn dispose_without_init_only_marks_disposed() {
        let a = swarm_on(&InProcTransport::new(), "a");
        a.dispose().await;
        assert_eq!(a.status(), SwarmStatus::Disposed);
        assert_eq!(a.distributed_signal().generation(), 0);
    }

    #[test]
    fn equality_tracks_table_contents() {
        let transport = InProcTransport::new();
        let key = PrivateKey::generate();
        let a = Swarm::with_transport(
            key.clone(),
            endpoint("t"),
            Duration::from_millis(100),
            Arc::new(transport.clone()),
        );
        let b = Swarm::builder(key, endpoint("t"))
            .transport(Arc::new(transport.clone()))
            .last_distributed(a.last_distributed())
            .build()
            .unwrap();
        let c = swarm_on(&transport, "t");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.key_equals(&c));

        a.add(c.as_peer());
        assert_ne!(a, b);
        assert!(a.key_equals(&b));
        assert_eq!(a, a.clone());
    }
}

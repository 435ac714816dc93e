//! In-process transport. Each bound `inproc://` endpoint is a bounded
//! channel registered in a shared `DashMap`; sending is a lookup plus an
//! enqueue.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::config::{INBOX_CAPACITY, INPROC_SCHEME};
use crate::network::message::PeerListMessage;
use crate::network::peer::Endpoint;
use crate::network::transport::{Inbox, Transport, TransportError};

/// A registry of process-local endpoints. Clones share the registry.
#[derive(Debug, Clone)]
pub struct InProcTransport {
    routes: Arc<DashMap<Endpoint, mpsc::Sender<PeerListMessage>>>,
    capacity: usize,
}

impl InProcTransport {
    /// A fresh, isolated registry.
    pub fn new() -> Self {
        Self::with_capacity(INBOX_CAPACITY)
    }

    /// A fresh registry whose inboxes hold at most `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            routes: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// The process-wide registry used by [`default_transport`](super::transport::default_transport).
    pub fn shared() -> Self {
        static SHARED: OnceLock<InProcTransport> = OnceLock::new();
        SHARED.get_or_init(InProcTransport::new).clone()
    }

    /// True while something is bound at `endpoint`.
    pub fn is_bound(&self, endpoint: &Endpoint) -> bool {
        self.routes
            .get(endpoint)
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    fn check_scheme(endpoint: &Endpoint) -> Result<(), TransportError> {
        if endpoint.scheme() == INPROC_SCHEME {
            Ok(())
        } else {
            Err(TransportError::UnsupportedScheme(endpoint.scheme().to_string()))
        }
    }
}

impl Default for InProcTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InProcTransport {
    async fn bind(&self, endpoint: &Endpoint) -> Result<Inbox, TransportError> {
        Self::check_scheme(endpoint)?;
        let (sender, inbox) = Inbox::channel(self.capacity);

        match self.routes.entry(endpoint.clone()) {
            // A stale route left by a dropped inbox can be taken over.
            Entry::Occupied(mut occupied) if occupied.get().is_closed() => {
                occupied.insert(sender);
            }
            Entry::Occupied(_) => {
                return Err(TransportError::AddressInUse(endpoint.to_string()));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(sender);
            }
        }

        trace!(%endpoint, "inproc endpoint bound");
        Ok(inbox)
    }

    async fn send(&self, to: &Endpoint, message: &PeerListMessage) -> Result<(), TransportError> {
        Self::check_scheme(to)?;
        // Clone the sender out so the map shard is not locked across the await.
        let sender = self
            .routes
            .get(to)
            .map(|route| route.value().clone())
            .ok_or_else(|| TransportError::Unreachable(to.to_string()))?;

        sender
            .send(message.clone())
            .await
            .map_err(|_| TransportError::Unreachable(to.to_string()))
    }

    async fn unbind(&self, endpoint: &Endpoint) {
        if self.routes.remove(endpoint).is_some() {
            trace!(%endpoint, "inproc endpoint unbound");
        }
    }
}

//! # Transport Boundary
//!
//! The gossip core needs exactly two things from the network: deliver a
//! [`PeerListMessage`] to an endpoint, and hand over whatever arrives at our
//! own endpoint. [`Transport`] is that seam. The swarm never touches sockets
//! directly, so the medium is pluggable:
//!
//! ```text
//! inproc.rs process-local registry of channels (inproc://name)
//! tcp.rs    one TCP connection per message, length-prefixed bincode frames
//! ```
//!
//! [`default_transport`] picks the bundled implementation matching an
//! endpoint's scheme.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{INPROC_SCHEME, TCP_SCHEME};
use crate::network::inproc::InProcTransport;
use crate::network::message::PeerListMessage;
use crate::network::peer::Endpoint;
use crate::network::tcp::TcpTransport;

/// Errors surfaced by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing is listening at the target endpoint.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The transport does not handle this endpoint's scheme.
    #[error("unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),

    /// Another listener already owns the endpoint.
    #[error("endpoint already bound: {0}")]
    AddressInUse(String),

    /// Socket-level failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The payload could not be encoded or decoded.
    #[error("message codec error: {0}")]
    Codec(String),

    /// A frame exceeded the configured maximum.
    #[error("frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Announced frame length.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// The send did not complete within the swarm's timeout.
    #[error("send to {endpoint} timed out after {timeout_ms}ms")]
    Timeout {
        /// Target endpoint.
        endpoint: String,
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The send panicked inside the transport.
    #[error("send to {0} panicked")]
    Panicked(String),
}

impl From<bincode::Error> for TransportError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Receiving half of a bound endpoint.
#[derive(Debug)]
pub struct Inbox {
    receiver: mpsc::Receiver<PeerListMessage>,
}

impl Inbox {
    /// Creates a bounded queue and its inbox.
    pub fn channel(capacity: usize) -> (mpsc::Sender<PeerListMessage>, Inbox) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Inbox { receiver })
    }

    /// Next inbound message. `None` once the endpoint is unbound and every
    /// in-flight delivery has drained.
    pub async fn recv(&mut self) -> Option<PeerListMessage> {
        self.receiver.recv().await
    }
}

/// A medium that can deliver peer lists between endpoints.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Starts accepting messages addressed to `endpoint`.
    async fn bind(&self, endpoint: &Endpoint) -> Result<Inbox, TransportError>;

    /// Delivers `message` to whatever is bound at `to`.
    ///
    /// Success means the message was handed to the remote endpoint's queue
    /// or socket, not that the remote node processed it.
    async fn send(&self, to: &Endpoint, message: &PeerListMessage) -> Result<(), TransportError>;

    /// Stops accepting messages for `endpoint`. Unbinding an endpoint that
    /// is not bound does nothing.
    async fn unbind(&self, endpoint: &Endpoint);
}

/// The bundled transport for an endpoint's scheme.
///
/// `inproc://` endpoints share one process-wide registry so swarms created
/// independently can still reach each other.
pub fn default_transport(endpoint: &Endpoint) -> Result<Arc<dyn Transport>, TransportError> {
    match endpoint.scheme() {
        INPROC_SCHEME => Ok(Arc::new(InProcTransport::shared())),
        TCP_SCHEME => Ok(Arc::new(TcpTransport::new())),
        other => Err(TransportError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_transport_covers_bundled_schemes() {
        let inproc = Endpoint::parse("inproc://default-transport-test").unwrap();
        let tcp = Endpoint::parse("tcp://127.0.0.1:1").unwrap();
        assert!(default_transport(&inproc).is_ok());
        assert!(default_transport(&tcp).is_ok());
    }

    #[tokio::test]
    async fn inbox_drains_then_closes() {
        let (sender, mut inbox) = Inbox::channel(4);
        let sender_peer = crate::network::peer::Peer::new(
            crate::crypto::keys::PrivateKey::generate().public_key(),
            Endpoint::parse("inproc://x").unwrap(),
        );
        let message = PeerListMessage::new(sender_peer, vec![], chrono::Utc::now());

        sender.send(message.clone()).await.unwrap();
        drop(sender);

        assert_eq!(inbox.recv().await, Some(message));
        assert_eq!(inbox.recv().await, None);
    }
}

//! TCP transport.
//!
//! Each send opens a connection, writes one frame and closes. A frame is a
//! 4-byte big-endian length followed by the bincode-encoded message. The
//! listener side accepts connections and reads frames until EOF, so a peer
//! that keeps its connection open may send several frames. Each frame must
//! arrive within the read timeout, and connections are owned by the accept
//! task: unbinding an endpoint closes every connection it accepted.
//!
//! Gossip rounds are seconds apart, which makes connection reuse not worth
//! its bookkeeping here.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, trace, warn};

use crate::config::{DEFAULT_SEND_TIMEOUT, INBOX_CAPACITY, MAX_FRAME_BYTES, TCP_SCHEME};
use crate::network::message::PeerListMessage;
use crate::network::peer::Endpoint;
use crate::network::transport::{Inbox, Transport, TransportError};

/// TCP listener/dialer pair for `tcp://host:port` endpoints.
#[derive(Debug)]
pub struct TcpTransport {
    listeners: DashMap<Endpoint, JoinHandle<()>>,
    max_frame_bytes: usize,
    capacity: usize,
    read_timeout: Duration,
}

impl TcpTransport {
    /// Transport with the default frame limit and inbox capacity.
    pub fn new() -> Self {
        Self::with_limits(MAX_FRAME_BYTES, INBOX_CAPACITY)
    }

    /// Transport with explicit frame and queue limits.
    pub fn with_limits(max_frame_bytes: usize, capacity: usize) -> Self {
        Self {
            listeners: DashMap::new(),
            max_frame_bytes,
            capacity: capacity.max(1),
            read_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Sets how long an inbound connection may wait for its next frame.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    fn check_scheme(endpoint: &Endpoint) -> Result<(), TransportError> {
        if endpoint.scheme() == TCP_SCHEME {
            Ok(())
        } else {
            Err(TransportError::UnsupportedScheme(endpoint.scheme().to_string()))
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        for listener in self.listeners.iter() {
            listener.value().abort();
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn bind(&self, endpoint: &Endpoint) -> Result<Inbox, TransportError> {
        Self::check_scheme(endpoint)?;
        if self.listeners.contains_key(endpoint) {
            return Err(TransportError::AddressInUse(endpoint.to_string()));
        }

        let listener = TcpListener::bind(endpoint.location())
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::AddrInUse => TransportError::AddressInUse(endpoint.to_string()),
                _ => TransportError::Io(err),
            })?;

        let (sender, inbox) = Inbox::channel(self.capacity);
        let handle = tokio::spawn(accept_loop(
            listener,
            sender,
            self.max_frame_bytes,
            self.read_timeout,
            endpoint.clone(),
        ));
        self.listeners.insert(endpoint.clone(), handle);

        debug!(%endpoint, "tcp endpoint bound");
        Ok(inbox)
    }

    async fn send(&self, to: &Endpoint, message: &PeerListMessage) -> Result<(), TransportError> {
        Self::check_scheme(to)?;
        let payload = message.encode()?;

        let mut stream = TcpStream::connect(to.location())
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::ConnectionRefused => TransportError::Unreachable(to.to_string()),
                _ => TransportError::Io(err),
            })?;

        write_frame(&mut stream, &payload, self.max_frame_bytes).await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn unbind(&self, endpoint: &Endpoint) {
        if let Some((_, handle)) = self.listeners.remove(endpoint) {
            handle.abort();
            debug!(%endpoint, "tcp endpoint unbound");
        }
    }
}

/// Accepts connections until aborted. Aborting drops `connections`, which
/// aborts every reader it spawned.
async fn accept_loop(
    listener: TcpListener,
    sender: mpsc::Sender<PeerListMessage>,
    max_frame_bytes: usize,
    read_timeout: Duration,
    endpoint: Endpoint,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    trace!(%endpoint, %remote, "inbound connection");
                    let sender = sender.clone();
                    let endpoint = endpoint.clone();
                    connections.spawn(async move {
                        if let Err(err) =
                            read_connection(stream, &sender, max_frame_bytes, read_timeout).await
                        {
                            debug!(%endpoint, %remote, error = %err, "dropping inbound connection");
                        }
                    });
                }
                Err(err) => {
                    warn!(%endpoint, error = %err, "accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn read_connection(
    mut stream: TcpStream,
    sender: &mpsc::Sender<PeerListMessage>,
    max_frame_bytes: usize,
    read_timeout: Duration,
) -> Result<(), TransportError> {
    loop {
        let frame = tokio::time::timeout(read_timeout, read_frame(&mut stream, max_frame_bytes))
            .await
            .map_err(|_| TransportError::Timeout {
                endpoint: stream
                    .peer_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_else(|_| "unknown peer".to_string()),
                timeout_ms: read_timeout.as_millis() as u64,
            })??;
        let Some(frame) = frame else { break };
        let message = PeerListMessage::decode(&frame)?;
        if sender.send(message).await.is_err() {
            // Inbox dropped: the owning swarm is gone.
            break;
        }
    }
    Ok(())
}

/// Writes one length-prefixed frame.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    max_frame_bytes: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_frame_bytes {
        return Err(TransportError::FrameTooLarge {
            size: payload.len(),
            max: max_frame_bytes,
        });
    }
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::FrameTooLarge {
        size: payload.len(),
        max: max_frame_bytes,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame. `Ok(None)` on a clean EOF between frames.
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > max_frame_bytes {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: max_frame_bytes,
        });
    }

    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;
    use crate::network::peer::Peer;
    use chrono::Utc;

    fn free_local_endpoint() -> Endpoint {
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = reserved.local_addr().unwrap().port();
        drop(reserved);
        Endpoint::parse(&format!("tcp://127.0.0.1:{port}")).unwrap()
    }

    fn message_from(endpoint: &Endpoint) -> PeerListMessage {
        let sender = Peer::new(PrivateKey::generate().public_key(), endpoint.clone());
        let known = Peer::new(
            PrivateKey::generate().public_key(),
            Endpoint::parse("tcp://10.1.1.1:9750").unwrap(),
        );
        PeerListMessage::new(sender, vec![known], Utc::now())
    }

    #[tokio::test]
    async fn frame_roundtrip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut client, b"hello", 16).await.unwrap();
        drop(client);

        assert_eq!(
            read_frame(&mut server, 16).await.unwrap(),
            Some(b"hello".to_vec())
        );
        assert_eq!(read_frame(&mut server, 16).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected_both_ways() {
        let (mut client, mut server) = tokio::io::duplex(64);
        assert!(matches!(
            write_frame(&mut client, &[0u8; 32], 16).await,
            Err(TransportError::FrameTooLarge { size: 32, max: 16 })
        ));

        client.write_all(&1000u32.to_be_bytes()).await.unwrap();
        assert!(matches!(
            read_frame(&mut server, 16).await,
            Err(TransportError::FrameTooLarge { size: 1000, max: 16 })
        ));
    }

    #[tokio::test]
    async fn delivers_message_over_localhost() {
        let transport = TcpTransport::new();
        let endpoint = free_local_endpoint();
        let mut inbox = transport.bind(&endpoint).await.unwrap();

        let message = message_from(&endpoint);
        transport.send(&endpoint, &message).await.unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(5), inbox.recv())
            .await
            .expect("message should arrive");
        assert_eq!(received, Some(message));

        transport.unbind(&endpoint).await;
    }

    #[tokio::test]
    async fn send_to_closed_port_fails() {
        let transport = TcpTransport::new();
        let endpoint = free_local_endpoint();
        assert!(transport.send(&endpoint, &message_from(&endpoint)).await.is_err());
    }

    /// Waits for the server side to close `client`, failing after five seconds.
    async fn assert_closed_by_server(client: &mut TcpStream) {
        let mut buf = [0u8; 8];
        let read = tokio::time::timeout(std::time::Duration::from_secs(5), client.read(&mut buf))
            .await
            .expect("server should close the connection");
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    #[tokio::test]
    async fn unbind_closes_idle_inbound_connections() {
        let transport = TcpTransport::new().with_read_timeout(Duration::from_secs(60));
        let endpoint = free_local_endpoint();
        let _inbox = transport.bind(&endpoint).await.unwrap();

        let mut idle = TcpStream::connect(endpoint.location()).await.unwrap();
        // Let the accept loop pick the connection up before tearing down.
        tokio::time::sleep(Duration::from_millis(50)).await;
        transport.unbind(&endpoint).await;

        assert_closed_by_server(&mut idle).await;
    }

    #[tokio::test]
    async fn stalled_frame_is_dropped_after_read_timeout() {
        let transport = TcpTransport::new().with_read_timeout(Duration::from_millis(100));
        let endpoint = free_local_endpoint();
        let mut inbox = transport.bind(&endpoint).await.unwrap();

        // Announce a frame, then never send it.
        let mut stalled = TcpStream::connect(endpoint.location()).await.unwrap();
        stalled.write_all(&64u32.to_be_bytes()).await.unwrap();
        assert_closed_by_server(&mut stalled).await;

        // The listener is still healthy for well-behaved senders.
        let message = message_from(&endpoint);
        transport.send(&endpoint, &message).await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(5), inbox.recv())
            .await
            .expect("message should arrive");
        assert_eq!(received, Some(message));

        transport.unbind(&endpoint).await;
    }

    #[tokio::test]
    async fn double_bind_is_rejected() {
        let transport = TcpTransport::new();
        let endpoint = free_local_endpoint();
        let _inbox = transport.bind(&endpoint).await.unwrap();
        assert!(matches!(
            transport.bind(&endpoint).await,
            Err(TransportError::AddressInUse(_))
        ));
        transport.unbind(&endpoint).await;
    }
}

// src/network/transport.rs
//! Request/response transport between overlay processes.
//!
//! Every exchange is one request frame followed by one response frame on a
//! fresh connection. `TcpTransport` carries frames over TCP with a length
//! prefix; `MemoryTransport` hands them straight to registered handlers and
//! is used to run whole networks inside one process.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, trace};

use crate::config::constants::{CONNECT_TIMEOUT, MAX_MESSAGE_SIZE, REQUEST_TIMEOUT};
use crate::protocol::{decode_response, encode_request, request_name, Request, Response};
use crate::server::{dispatch, RequestHandler};
use crate::types::OnionError;

/// Error type for transport failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out talking to {0}")]
    Timeout(SocketAddr),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed by {0} before a response")]
    ConnectionClosed(SocketAddr),

    #[error("Nothing is listening on {0}")]
    Unreachable(SocketAddr),
}

impl From<TransportError> for OnionError {
    fn from(err: TransportError) -> Self {
        OnionError::Network(err.to_string())
    }
}

/// Moves one request frame to `addr` and returns the response frame
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, addr: SocketAddr, payload: Bytes) -> Result<Bytes, TransportError>;
}

/// Send a typed request and decode the typed response
pub async fn call(
    transport: &dyn Transport,
    addr: SocketAddr,
    request: &Request,
) -> Result<Response, OnionError> {
    let frame = encode_request(request)?;
    trace!("Sending {} to {}", request_name(request), addr);
    let reply = transport.send(addr, frame).await?;
    Ok(decode_response(&reply)?)
}

fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_MESSAGE_SIZE)
        .new_codec()
}

/// Wrap a connected stream in the overlay's frame codec
pub fn framed(stream: TcpStream) -> Framed<TcpStream, LengthDelimitedCodec> {
    Framed::new(stream, frame_codec())
}

/// TCP transport with connect and request timeouts
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, addr: SocketAddr, payload: Bytes) -> Result<Bytes, TransportError> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout(addr))?
            .map_err(|source| TransportError::Connect { addr, source })?;
        stream.set_nodelay(true)?;

        timeout(self.request_timeout, exchange(framed(stream), addr, payload))
            .await
            .map_err(|_| TransportError::Timeout(addr))?
    }
}

async fn exchange(
    mut frames: Framed<TcpStream, LengthDelimitedCodec>,
    addr: SocketAddr,
    payload: Bytes,
) -> Result<Bytes, TransportError> {
    frames.send(payload).await?;
    match frames.next().await {
        Some(frame) => Ok(frame?.freeze()),
        None => Err(TransportError::ConnectionClosed(addr)),
    }
}

/// In-process transport that routes frames to handlers by address
#[derive(Default)]
pub struct MemoryTransport {
    handlers: RwLock<HashMap<SocketAddr, Arc<dyn RequestHandler>>>,
    requests: AtomicU64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handler` at `addr`, replacing any previous one
    pub fn register(&self, addr: SocketAddr, handler: Arc<dyn RequestHandler>) {
        debug!("Memory transport: handler attached at {}", addr);
        self.handlers.write().insert(addr, handler);
    }

    pub fn unregister(&self, addr: &SocketAddr) -> bool {
        self.handlers.write().remove(addr).is_some()
    }

    /// Number of frames delivered so far
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, addr: SocketAddr, payload: Bytes) -> Result<Bytes, TransportError> {
        // Clone out of the lock; handlers may call back into the transport
        let handler = self
            .handlers
            .read()
            .get(&addr)
            .cloned()
            .ok_or(TransportError::Unreachable(addr))?;

        self.requests.fetch_add(1, Ordering::Relaxed);
        Ok(dispatch(handler.as_ref(), &payload).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    struct Echo;

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, request: Request) -> Response {
            match request {
                Request::Deliver { message } => Response::Text { result: Some(message) },
                _ => Response::Live,
            }
        }
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_memory_transport_routes_by_address() {
        let transport = MemoryTransport::new();
        transport.register(addr(4001), Arc::new(Echo));

        let response = call(&transport, addr(4001), &Request::Deliver { message: "hi".into() })
            .await
            .unwrap();
        assert_eq!(response, Response::Text { result: Some("hi".into()) });
        assert_eq!(transport.request_count(), 1);

        let missing = call(&transport, addr(4002), &Request::Status).await;
        assert!(matches!(missing, Err(OnionError::Network(_))));

        assert!(transport.unregister(&addr(4001)));
        assert!(call(&transport, addr(4001), &Request::Status).await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_transport_single_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut frames = framed(stream);
            let request = frames.next().await.unwrap().unwrap();
            frames.send(dispatch(&Echo, &request).await).await.unwrap();
        });

        let transport = TcpTransport::default();
        let response = call(&transport, local, &Request::Status).await.unwrap();
        assert_eq!(response, Response::Live);
    }

    #[tokio::test]
    async fn test_tcp_transport_connection_refused() {
        // Bind and drop to get a port with nothing behind it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();
        drop(listener);

        let transport = TcpTransport::new(Duration::from_secs(1));
        let result = transport.send(local, Bytes::from_static(b"{}")).await;
        assert!(matches!(
            result,
            Err(TransportError::Connect { .. }) | Err(TransportError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_tcp_transport_peer_hangs_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut frames = framed(stream);
            let _ = frames.next().await;
        });

        let transport = TcpTransport::default();
        let result = transport.send(local, Bytes::from_static(b"{}")).await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectionClosed(_)) | Err(TransportError::Io(_))
        ));
    }
}

// src/server/connection.rs
//! Serving requests on one accepted connection.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::network::framed;
use crate::server::core::ServerError;
use crate::server::handler::{dispatch, RequestHandler};

/// Answer request frames until the peer closes the connection or stays
/// silent for `idle_timeout`
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<dyn RequestHandler>,
    idle_timeout: Duration,
) -> Result<(), ServerError> {
    let mut frames = framed(stream);
    let mut served = 0usize;

    loop {
        let frame = match timeout(idle_timeout, frames.next()).await {
            Ok(Some(frame)) => frame?,
            Ok(None) => break,
            Err(_) => {
                debug!("Connection from {} idle for {:?}, closing", peer, idle_timeout);
                break;
            }
        };
        let reply = dispatch(handler.as_ref(), &frame).await;
        frames.send(reply).await?;
        served += 1;
    }

    trace!("Connection from {} closed after {} request(s)", peer, served);
    Ok(())
}

// src/server/core.rs
//! Core server implementation for overlay processes.
//!
//! A `NodeServer` binds a TCP listener, accepts connections and hands each
//! one to its own task, which answers frames with the process's
//! `RequestHandler`. Connection tasks are owned by the accept loop and are
//! aborted when the server shuts down.

use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tracing::{debug, error, info, trace, warn};

use crate::config::constants::{ACCEPT_RETRY_DELAY, REQUEST_TIMEOUT};
use crate::server::connection::handle_connection;
use crate::server::handler::RequestHandler;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Initial state
    Created,
    /// Server is binding its listener
    Starting,
    /// Server is accepting connections
    Running,
    /// Server is shutting down
    ShuttingDown,
    /// Server has stopped
    Stopped,
}

/// Listener for one overlay process
pub struct NodeServer {
    name: String,
    listen_addr: SocketAddr,
    handler: Arc<dyn RequestHandler>,
    idle_timeout: Duration,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeServer {
    pub fn new(name: impl Into<String>, listen_addr: SocketAddr, handler: Arc<dyn RequestHandler>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            listen_addr,
            handler,
            idle_timeout: REQUEST_TIMEOUT,
            state: Arc::new(RwLock::new(ServerState::Created)),
            shutdown_tx,
            accept_task: Mutex::new(None),
        }
    }

    /// Close connections that send nothing for `idle_timeout`
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    /// Bind the listener and start accepting connections.
    ///
    /// Returns the bound address, which differs from the configured one
    /// when port 0 was requested.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        {
            let mut state = self.state.write().await;
            if *state != ServerState::Created {
                return Err(ServerError::Internal(format!(
                    "Cannot start {} in state {:?}",
                    self.name, *state
                )));
            }
            *state = ServerState::Starting;
        }

        let listener = match TcpListener::bind(self.listen_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!("{}: failed to bind {}: {}", self.name, self.listen_addr, source);
                *self.state.write().await = ServerState::Stopped;
                return Err(ServerError::Bind {
                    addr: self.listen_addr,
                    source,
                });
            }
        };
        let local_addr = listener.local_addr()?;

        *self.state.write().await = ServerState::Running;
        info!("{} listening on {}", self.name, local_addr);

        let handle = tokio::spawn(accept_loop(
            self.name.clone(),
            listener,
            self.handler.clone(),
            self.idle_timeout,
            self.state.clone(),
            self.shutdown_tx.subscribe(),
        ));
        *self.accept_task.lock() = Some(handle);

        Ok(local_addr)
    }

    /// Stop accepting connections, close the open ones and wait for the
    /// accept loop to exit
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        {
            let mut state = self.state.write().await;
            match *state {
                ServerState::ShuttingDown | ServerState::Stopped => {
                    debug!("{} already shutting down or stopped", self.name);
                    return Ok(());
                }
                ServerState::Created => {
                    *state = ServerState::Stopped;
                    return Ok(());
                }
                _ => {}
            }
            info!("Shutting down {} (current state: {:?})", self.name, *state);
            *state = ServerState::ShuttingDown;
        }

        let _ = self.shutdown_tx.send(true);

        let handle = self.accept_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("{}: accept loop ended abnormally: {}", self.name, e);
            }
        }

        *self.state.write().await = ServerState::Stopped;
        info!("{} stopped", self.name);
        Ok(())
    }
}

async fn accept_loop(
    name: String,
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
    idle_timeout: Duration,
    state: Arc<RwLock<ServerState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("{}: shutdown signalled, stopping accept loop", name);
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!("{}: accepted connection from {}", name, peer);
                    let handler = handler.clone();
                    let name = name.clone();
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, handler, idle_timeout).await {
                            debug!("{}: connection from {} ended with error: {}", name, peer, e);
                        }
                    });
                }
                Err(e) => {
                    if *state.read().await != ServerState::Running {
                        break;
                    }
                    error!("{}: error accepting connection: {}", name, e);
                    // Avoid busy-looping on accept errors
                    time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
            // Reap finished connections
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    if !connections.is_empty() {
        debug!("{}: closing {} open connection(s)", name, connections.len());
    }
    connections.shutdown().await;
    info!("{}: listener task stopped", name);
}

// src/relay/forwarder.rs
//! Onion router message handling.
//!
//! Each inbound layer is peeled with the node's private key. A forward body
//! is passed to the next relay, a final body is delivered to its user, and
//! anything that fails to open is dropped with a coarse error. Failures are
//! never forwarded and the sender learns nothing about why a layer was
//! refused.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::constants::{STATUS_BAD_GATEWAY, STATUS_BAD_REQUEST};
use crate::config::NetworkConfig;
use crate::crypto::NodeIdentity;
use crate::network::{call, Transport};
use crate::onion::{peel_one_layer, LayerContent};
use crate::protocol::{Request, Response};
use crate::server::{unsupported, RequestHandler};
use crate::types::{Destination, NodeId, Result, UserId};
use crate::utils::logging::log_security_event;

/// Diagnostic view of the last message this relay handled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayState {
    pub last_received_encrypted: Option<String>,
    pub last_received_decrypted: Option<String>,
    pub last_destination: Option<Destination>,
}

/// What happened to a layer that opened correctly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Forwarded(NodeId),
    Delivered(UserId),
}

pub struct RelayForwarder {
    identity: NodeIdentity,
    network: NetworkConfig,
    transport: Arc<dyn Transport>,
    state: RwLock<RelayState>,
}

impl RelayForwarder {
    pub fn new(identity: NodeIdentity, network: NetworkConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            identity,
            network,
            transport,
            state: RwLock::new(RelayState::default()),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.identity.node_id()
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Peel one layer of `layer` and pass the rest on
    pub async fn handle_onion(&self, layer: &str) -> Result<RelayOutcome> {
        self.state.write().last_received_encrypted = Some(layer.to_string());

        let content = peel_one_layer(self.identity.private_key(), layer).map_err(|e| {
            log_security_event(
                "ONION_LAYER_REJECTED",
                &format!("node {} dropped a layer: {}", self.node_id(), e),
            );
            e
        })?;

        match content {
            LayerContent::Forward { next_hop, inner } => {
                self.record(inner.clone(), Destination::Relay(next_hop));
                let addr = self.network.relay_addr(next_hop)?;
                debug!("Node {} forwarding to relay {} at {}", self.node_id(), next_hop, addr);

                call(self.transport.as_ref(), addr, &Request::Onion { layer: inner })
                    .await?
                    .expect_ok()?;
                Ok(RelayOutcome::Forwarded(next_hop))
            }
            LayerContent::Deliver { destination, plaintext } => {
                self.record(plaintext.clone(), Destination::User(destination));
                let addr = self.network.user_addr(destination)?;
                debug!("Node {} delivering to user {} at {}", self.node_id(), destination, addr);

                call(self.transport.as_ref(), addr, &Request::Deliver { message: plaintext })
                    .await?
                    .expect_ok()?;
                Ok(RelayOutcome::Delivered(destination))
            }
        }
    }

    fn record(&self, decrypted: String, destination: Destination) {
        let mut state = self.state.write();
        state.last_received_decrypted = Some(decrypted);
        state.last_destination = Some(destination);
    }

    pub fn state(&self) -> RelayState {
        self.state.read().clone()
    }

    pub fn last_received_encrypted(&self) -> Option<String> {
        self.state.read().last_received_encrypted.clone()
    }

    pub fn last_received_decrypted(&self) -> Option<String> {
        self.state.read().last_received_decrypted.clone()
    }

    pub fn last_destination(&self) -> Option<Destination> {
        self.state.read().last_destination
    }
}

#[async_trait]
impl RequestHandler for RelayForwarder {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Status => Response::Live,
            Request::Onion { layer } => match self.handle_onion(&layer).await {
                Ok(outcome) => {
                    info!("Node {} handled layer: {:?}", self.node_id(), outcome);
                    Response::Ok
                }
                Err(e) if e.is_rejection() => Response::error(STATUS_BAD_REQUEST, "rejected"),
                Err(e) => {
                    warn!("Node {} failed to pass message on: {}", self.node_id(), e);
                    Response::error(STATUS_BAD_GATEWAY, "forwarding failed")
                }
            },
            Request::GetLastReceivedEncryptedMessage => Response::Text {
                result: self.last_received_encrypted(),
            },
            Request::GetLastReceivedDecryptedMessage => Response::Text {
                result: self.last_received_decrypted(),
            },
            Request::GetLastMessageDestination => Response::Destination {
                result: self.last_destination(),
            },
            other => unsupported(&other),
        }
    }
}

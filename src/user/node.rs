// src/user/node.rs
//! User endpoint: an inbox plus the entry point for sending through a
//! fresh circuit.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::circuit::{Circuit, CircuitBuilder};
use crate::config::constants::STATUS_INTERNAL;
use crate::config::NetworkConfig;
use crate::network::Transport;
use crate::protocol::{Request, Response};
use crate::registry::{RegistryClient, RemoteRegistry};
use crate::server::{unsupported, NodeServer, RequestHandler};
use crate::types::{NodeId, Result, UserId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub last_received: Option<String>,
    pub last_sent: Option<String>,
    pub last_circuit: Vec<NodeId>,
}

pub struct UserNode {
    user_id: UserId,
    builder: CircuitBuilder,
    registry: Arc<dyn RegistryClient>,
    state: RwLock<UserState>,
}

impl UserNode {
    pub fn new(
        user_id: UserId,
        network: NetworkConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn RegistryClient>,
    ) -> Self {
        Self {
            user_id,
            builder: CircuitBuilder::new(transport, network),
            registry,
            state: RwLock::new(UserState::default()),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Inbox: called by the final relay of a circuit
    pub fn deliver(&self, message: String) {
        info!("User {} received message: {}", self.user_id, message);
        self.state.write().last_received = Some(message);
    }

    /// Send `message` to `destination` through a newly chosen circuit
    pub async fn send_message(&self, message: &str, destination: UserId) -> Result<Circuit> {
        self.state.write().last_sent = Some(message.to_string());

        let path = self.builder.choose_path(self.registry.as_ref()).await?;
        self.state.write().last_circuit = path.iter().map(|entry| entry.node_id).collect();

        self.builder.build_message(&path, destination, message).await
    }

    pub fn state(&self) -> UserState {
        self.state.read().clone()
    }

    pub fn last_received_message(&self) -> Option<String> {
        self.state.read().last_received.clone()
    }

    pub fn last_sent_message(&self) -> Option<String> {
        self.state.read().last_sent.clone()
    }

    pub fn last_circuit(&self) -> Vec<NodeId> {
        self.state.read().last_circuit.clone()
    }
}

#[async_trait]
impl RequestHandler for UserNode {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Status => Response::Live,
            Request::Deliver { message } => {
                self.deliver(message);
                Response::Ok
            }
            Request::SendMessage {
                message,
                destination_user_id,
            } => match self.send_message(&message, destination_user_id).await {
                Ok(_) => Response::Ok,
                Err(e) => {
                    // The sender only learns that the send failed
                    warn!("User {} failed to send message: {}", self.user_id, e);
                    Response::error(STATUS_INTERNAL, "failed to send message")
                }
            },
            Request::GetLastReceivedMessage => Response::Text {
                result: self.last_received_message(),
            },
            Request::GetLastSentMessage => Response::Text {
                result: self.last_sent_message(),
            },
            Request::GetLastCircuit => Response::Circuit {
                result: self.last_circuit(),
            },
            other => unsupported(&other),
        }
    }
}

/// A user endpoint listening on its port
pub struct UserProcess {
    node: Arc<UserNode>,
    server: NodeServer,
    local_addr: SocketAddr,
}

impl UserProcess {
    pub async fn launch(user_id: UserId, network: NetworkConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let listen_addr = network.user_addr(user_id)?;
        let registry = Arc::new(RemoteRegistry::new(transport.clone(), network.registry_addr()));
        let node = Arc::new(UserNode::new(user_id, network, transport, registry));

        let server = NodeServer::new(format!("user-{}", user_id), listen_addr, node.clone());
        let local_addr = server.start().await.map_err(|e| {
            error!("User {} failed to start: {}", user_id, e);
            e
        })?;

        info!("User {} is listening on {}", user_id, local_addr);
        Ok(Self {
            node,
            server,
            local_addr,
        })
    }

    pub fn node(&self) -> &Arc<UserNode> {
        &self.node
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.server.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NodeIdentity;
    use crate::network::MemoryTransport;
    use crate::registry::client::MockRegistryClient;
    use crate::types::OnionError;

    fn registry_with(count: u32) -> Arc<MockRegistryClient> {
        let nodes: Vec<_> = (1..=count)
            .map(|id| NodeIdentity::generate(id).registry_entry())
            .collect();
        let mut registry = MockRegistryClient::new();
        registry
            .expect_list_nodes()
            .returning(move || Ok(nodes.clone()));
        Arc::new(registry)
    }

    fn user(transport: Arc<MemoryTransport>, registry: Arc<MockRegistryClient>) -> UserNode {
        UserNode::new(1, NetworkConfig::default(), transport, registry)
    }

    #[tokio::test]
    async fn test_deliver_updates_inbox() {
        let node = user(Arc::new(MemoryTransport::new()), registry_with(3));
        assert_eq!(node.last_received_message(), None);

        let response = node.handle(Request::Deliver { message: "hi".into() }).await;
        assert_eq!(response, Response::Ok);
        assert_eq!(node.last_received_message(), Some("hi".into()));
        assert_eq!(
            node.handle(Request::GetLastReceivedMessage).await,
            Response::Text { result: Some("hi".into()) }
        );
    }

    #[tokio::test]
    async fn test_send_records_attempt_even_on_failure() {
        // No relays are reachable, so the send fails at the first hop
        let node = user(Arc::new(MemoryTransport::new()), registry_with(3));

        let result = node.send_message("hello", 2).await;
        assert!(matches!(result, Err(OnionError::Network(_))));
        assert_eq!(node.last_sent_message(), Some("hello".into()));
        assert_eq!(node.last_circuit().len(), 3);

        let response = node
            .handle(Request::SendMessage {
                message: "again".into(),
                destination_user_id: 2,
            })
            .await;
        assert_eq!(response, Response::error(STATUS_INTERNAL, "failed to send message"));
    }

    #[tokio::test]
    async fn test_send_with_too_few_relays() {
        let transport = Arc::new(MemoryTransport::new());
        let node = user(transport.clone(), registry_with(2));

        let result = node.send_message("hello", 2).await;
        assert!(matches!(result, Err(OnionError::InsufficientNodes { .. })));
        assert!(node.last_circuit().is_empty());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_send_follows_configured_path_length() {
        let network = NetworkConfig {
            path_length: 2,
            ..NetworkConfig::default()
        };
        let node = UserNode::new(1, network, Arc::new(MemoryTransport::new()), registry_with(4));

        assert!(node.send_message("hello", 2).await.is_err());
        assert_eq!(node.last_circuit().len(), 2);
    }

    #[tokio::test]
    async fn test_relay_requests_not_served() {
        let node = user(Arc::new(MemoryTransport::new()), registry_with(1));
        assert!(matches!(
            node.handle(Request::GetLastMessageDestination).await,
            Response::Error { code: 404, .. }
        ));
    }
}

// src/registry/service.rs
//! In-memory node registry.
//!
//! Entries are appended on registration and never changed or removed.
//! A second registration for an id that is already present is refused.

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::constants::{STATUS_BAD_REQUEST, STATUS_CONFLICT};
use crate::crypto::NodePublicKey;
use crate::protocol::{Request, Response};
use crate::registry::client::RegistryClient;
use crate::server::{unsupported, RequestHandler};
use crate::types::{NodeId, RegistryEntry, Result};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Node {0} is already registered")]
    Duplicate(NodeId),

    #[error("Invalid public key for node {node_id}: {reason}")]
    InvalidKey { node_id: NodeId, reason: String },
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<Vec<RegistryEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entry: RegistryEntry) -> std::result::Result<(), RegistrationError> {
        if let Err(e) = NodePublicKey::from_base64(&entry.pub_key) {
            return Err(RegistrationError::InvalidKey {
                node_id: entry.node_id,
                reason: e.to_string(),
            });
        }

        let mut entries = self.entries.write();
        if entries.iter().any(|existing| existing.node_id == entry.node_id) {
            return Err(RegistrationError::Duplicate(entry.node_id));
        }

        info!("Node {} registered with public key: {}", entry.node_id, entry.pub_key);
        entries.push(entry);
        Ok(())
    }

    /// Snapshot of every registered node, in registration order
    pub fn nodes(&self) -> Vec<RegistryEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl RequestHandler for Registry {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Status => Response::Live,
            Request::RegisterNode { node_id, pub_key } => {
                match self.register(RegistryEntry::new(node_id, pub_key)) {
                    Ok(()) => Response::Ok,
                    Err(e) => {
                        warn!("Registration refused: {}", e);
                        let code = match e {
                            RegistrationError::Duplicate(_) => STATUS_CONFLICT,
                            RegistrationError::InvalidKey { .. } => STATUS_BAD_REQUEST,
                        };
                        Response::error(code, e.to_string())
                    }
                }
            }
            Request::GetNodeRegistry => Response::Nodes { nodes: self.nodes() },
            other => unsupported(&other),
        }
    }
}

#[async_trait]
impl RegistryClient for Registry {
    async fn list_nodes(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self.nodes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NodeIdentity;
    use crate::network::MemoryTransport;
    use crate::registry::client::RemoteRegistry;
    use crate::types::OnionError;
    use std::net::SocketAddr;
    use std::sync::Arc;

    #[test]
    fn test_first_registration_wins() {
        let registry = Registry::new();
        let first = NodeIdentity::generate(1).registry_entry();
        let second = NodeIdentity::generate(1).registry_entry();

        registry.register(first.clone()).unwrap();
        assert_eq!(registry.register(second), Err(RegistrationError::Duplicate(1)));
        assert_eq!(registry.nodes(), vec![first]);
    }

    #[test]
    fn test_rejects_malformed_key() {
        let registry = Registry::new();
        let result = registry.register(RegistryEntry::new(4, "-----BEGIN PUBLIC KEY-----"));
        assert!(matches!(result, Err(RegistrationError::InvalidKey { node_id: 4, .. })));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_low_order_key() {
        let registry = Registry::new();
        let zero_key = base64::encode([0u8; 32]);
        assert!(matches!(
            registry.register(RegistryEntry::new(5, zero_key.clone())),
            Err(RegistrationError::InvalidKey { node_id: 5, .. })
        ));

        let response = registry
            .handle(Request::RegisterNode {
                node_id: 5,
                pub_key: zero_key,
            })
            .await;
        assert!(matches!(response, Response::Error { code: 400, .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_local_client_view() {
        let registry = Registry::new();
        let entry = NodeIdentity::generate(9).registry_entry();
        registry.register(entry.clone()).unwrap();

        let nodes = tokio_test::block_on(registry.list_nodes()).unwrap();
        assert_eq!(nodes, vec![entry]);
    }

    #[tokio::test]
    async fn test_handler_status_codes() {
        let registry = Registry::new();
        let entry = NodeIdentity::generate(2).registry_entry();
        let register = Request::RegisterNode {
            node_id: entry.node_id,
            pub_key: entry.pub_key.clone(),
        };

        assert_eq!(registry.handle(Request::Status).await, Response::Live);
        assert_eq!(registry.handle(register.clone()).await, Response::Ok);
        assert!(matches!(registry.handle(register).await, Response::Error { code: 409, .. }));
        assert!(matches!(
            registry.handle(Request::GetLastCircuit).await,
            Response::Error { code: 404, .. }
        ));
        assert_eq!(
            registry.handle(Request::GetNodeRegistry).await,
            Response::Nodes { nodes: vec![entry] }
        );
    }

    #[tokio::test]
    async fn test_remote_registry_over_transport() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 8080));
        let registry = Arc::new(Registry::new());
        let transport = Arc::new(MemoryTransport::new());
        transport.register(addr, registry.clone());

        let remote = RemoteRegistry::new(transport, addr);
        let nodes: Vec<_> = (1..=3).map(|id| NodeIdentity::generate(id).registry_entry()).collect();
        for node in &nodes {
            remote.register(node).await.unwrap();
        }

        assert_eq!(remote.list_nodes().await.unwrap(), nodes);
        assert!(matches!(
            remote.register(&nodes[0]).await,
            Err(OnionError::Remote { code: 409, .. })
        ));
        assert_eq!(registry.len(), 3);
    }
}

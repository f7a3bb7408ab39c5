// src/relay/router.rs
//! Onion router process: identity, registration and listener.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::NetworkConfig;
use crate::crypto::NodeIdentity;
use crate::network::Transport;
use crate::registry::RemoteRegistry;
use crate::relay::forwarder::RelayForwarder;
use crate::server::NodeServer;
use crate::types::{NodeId, Result};

pub struct OnionRouter {
    forwarder: Arc<RelayForwarder>,
    server: NodeServer,
    local_addr: SocketAddr,
}

impl OnionRouter {
    /// Generate a key pair, start listening on the node's port and
    /// register with the registry.
    pub async fn launch(
        node_id: NodeId,
        network: NetworkConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let identity = NodeIdentity::generate(node_id);
        let entry = identity.registry_entry();
        let listen_addr = network.relay_addr(node_id)?;
        let registry = RemoteRegistry::new(transport.clone(), network.registry_addr());

        let forwarder = Arc::new(RelayForwarder::new(identity, network, transport));
        let server = NodeServer::new(format!("onion-router-{}", node_id), listen_addr, forwarder.clone());
        let local_addr = server.start().await?;

        if let Err(e) = registry.register(&entry).await {
            error!("Onion router {} could not register: {}", node_id, e);
            server.shutdown().await?;
            return Err(e);
        }

        info!("Onion router {} is listening on {}", node_id, local_addr);
        Ok(Self {
            forwarder,
            server,
            local_addr,
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.forwarder.node_id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn forwarder(&self) -> &Arc<RelayForwarder> {
        &self.forwarder
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.server.shutdown().await?;
        Ok(())
    }
}

// src/registry/client.rs
//! Read access to the node registry, plus the registration call routers
//! make at startup.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::network::{call, Transport};
use crate::protocol::types::unexpected;
use crate::protocol::{Request, Response};
use crate::types::{RegistryEntry, Result};

/// Source of the live relay set used for path selection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<RegistryEntry>>;
}

/// Registry reached over a transport
#[derive(Clone)]
pub struct RemoteRegistry {
    transport: Arc<dyn Transport>,
    addr: SocketAddr,
}

impl RemoteRegistry {
    pub fn new(transport: Arc<dyn Transport>, addr: SocketAddr) -> Self {
        Self { transport, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Publish `entry`; fails with `Remote{409}` if the id is taken
    pub async fn register(&self, entry: &RegistryEntry) -> Result<()> {
        let request = Request::RegisterNode {
            node_id: entry.node_id,
            pub_key: entry.pub_key.clone(),
        };
        call(self.transport.as_ref(), self.addr, &request)
            .await?
            .expect_ok()?;
        info!("Node {} registered with registry at {}", entry.node_id, self.addr);
        Ok(())
    }
}

#[async_trait]
impl RegistryClient for RemoteRegistry {
    async fn list_nodes(&self) -> Result<Vec<RegistryEntry>> {
        match call(self.transport.as_ref(), self.addr, &Request::GetNodeRegistry)
            .await?
            .into_result()?
        {
            Response::Nodes { nodes } => {
                debug!("Registry at {} lists {} node(s)", self.addr, nodes.len());
                Ok(nodes)
            }
            other => Err(unexpected(&other)),
        }
    }
}

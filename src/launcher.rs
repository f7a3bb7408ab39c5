// src/launcher.rs
//! Start a whole overlay (registry, relays and users) in one process.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::NetworkConfig;
use crate::network::{TcpTransport, Transport};
use crate::registry::Registry;
use crate::relay::OnionRouter;
use crate::server::NodeServer;
use crate::types::Result;
use crate::user::UserProcess;

/// Handles to every process started by `launch_network`
pub struct RunningNetwork {
    pub registry: Arc<Registry>,
    registry_server: NodeServer,
    pub relays: Vec<OnionRouter>,
    pub users: Vec<UserProcess>,
}

impl RunningNetwork {
    pub fn relay(&self, node_id: u32) -> Option<&OnionRouter> {
        self.relays.iter().find(|relay| relay.node_id() == node_id)
    }

    pub fn user(&self, user_id: u32) -> Option<&UserProcess> {
        self.users.iter().find(|user| user.node().user_id() == user_id)
    }

    /// Stop users first, then relays, then the registry
    pub async fn shutdown(&self) -> Result<()> {
        for user in &self.users {
            user.shutdown().await?;
        }
        for relay in &self.relays {
            relay.shutdown().await?;
        }
        self.registry_server.shutdown().await?;
        info!("Network stopped");
        Ok(())
    }
}

/// Start a registry, relays `0..relays` and users `0..users` over TCP.
///
/// Anything already started is stopped again if a later step fails.
pub async fn launch_network(network: NetworkConfig, relays: u32, users: u32) -> Result<RunningNetwork> {
    network.validate()?;
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::new(network.connect_timeout));

    let registry = Arc::new(Registry::new());
    let registry_server = NodeServer::new("registry", network.registry_addr(), registry.clone());
    registry_server.start().await?;

    let mut running = RunningNetwork {
        registry,
        registry_server,
        relays: Vec::with_capacity(relays as usize),
        users: Vec::with_capacity(users as usize),
    };

    if let Err(e) = start_processes(&mut running, &network, transport, relays, users).await {
        warn!("Network launch failed, stopping started processes: {}", e);
        if let Err(stop_err) = running.shutdown().await {
            warn!("Cleanup after failed launch also failed: {}", stop_err);
        }
        return Err(e);
    }

    info!(
        "Network up: registry at {}, {} onion router(s), {} user(s)",
        network.registry_addr(),
        relays,
        users
    );
    Ok(running)
}

async fn start_processes(
    running: &mut RunningNetwork,
    network: &NetworkConfig,
    transport: Arc<dyn Transport>,
    relays: u32,
    users: u32,
) -> Result<()> {
    for node_id in 0..relays {
        let relay = OnionRouter::launch(node_id, network.clone(), transport.clone()).await?;
        running.relays.push(relay);
    }
    for user_id in 0..users {
        let user = UserProcess::launch(user_id, network.clone(), transport.clone()).await?;
        running.users.push(user);
    }
    Ok(())
}

// src/circuit.rs
//! Circuit construction.
//!
//! A sender samples distinct relays from the registry, wraps the message in
//! one layer per relay and hands the outermost layer to the first hop.

use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::NetworkConfig;
use crate::network::{call, Transport};
use crate::onion::build_onion;
use crate::protocol::Request;
use crate::registry::RegistryClient;
use crate::types::{NodeId, OnionError, RegistryEntry, Result, UserId};

/// Ordered relays a message went through, plus its recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    pub hops: Vec<NodeId>,
    pub destination: UserId,
}

/// Pick `length` distinct relays uniformly at random, in random order.
///
/// Entries repeating a node id count once.
pub fn select_path(available: &[RegistryEntry], length: usize) -> Result<Vec<RegistryEntry>> {
    if length == 0 {
        return Err(OnionError::InvalidPath("path length must be at least 1".into()));
    }

    let mut seen = HashSet::with_capacity(available.len());
    let distinct: Vec<&RegistryEntry> = available
        .iter()
        .filter(|entry| seen.insert(entry.node_id))
        .collect();

    if distinct.len() < length {
        return Err(OnionError::InsufficientNodes {
            requested: length,
            available: distinct.len(),
        });
    }

    let mut rng = thread_rng();
    let mut path: Vec<RegistryEntry> = distinct
        .choose_multiple(&mut rng, length)
        .map(|entry| (*entry).clone())
        .collect();
    // choose_multiple does not promise a random order
    path.shuffle(&mut rng);
    Ok(path)
}

pub struct CircuitBuilder {
    transport: Arc<dyn Transport>,
    network: NetworkConfig,
}

impl CircuitBuilder {
    pub fn new(transport: Arc<dyn Transport>, network: NetworkConfig) -> Self {
        Self { transport, network }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Build the onion for `path` and send it to the first hop
    pub async fn build_message(
        &self,
        path: &[RegistryEntry],
        destination: UserId,
        plaintext: &str,
    ) -> Result<Circuit> {
        let layer = build_onion(path, destination, plaintext)?;
        let entry = self.network.relay_addr(path[0].node_id)?;

        debug!("Sending onion to entry relay {} at {}", path[0].node_id, entry);
        call(self.transport.as_ref(), entry, &Request::Onion { layer })
            .await?
            .expect_ok()?;

        let circuit = Circuit {
            hops: path.iter().map(|entry| entry.node_id).collect(),
            destination,
        };
        info!("Message sent to user {} through circuit {:?}", destination, circuit.hops);
        Ok(circuit)
    }

    /// Read the registry and pick a path of the configured length
    pub async fn choose_path(&self, registry: &dyn RegistryClient) -> Result<Vec<RegistryEntry>> {
        let nodes = registry.list_nodes().await?;
        select_path(&nodes, self.network.path_length)
    }

    /// Choose a path and send
    pub async fn send(
        &self,
        registry: &dyn RegistryClient,
        destination: UserId,
        plaintext: &str,
    ) -> Result<Circuit> {
        let path = self.choose_path(registry).await?;
        self.build_message(&path, destination, plaintext).await
    }
}

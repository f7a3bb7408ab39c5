// Export all modules for public use
pub mod circuit;
pub mod config;
pub mod crypto;
pub mod launcher;
pub mod network;
pub mod onion;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod types;
pub mod user;
pub mod utils;

// Re-export the most commonly used items for convenience
pub use crate::circuit::{select_path, Circuit, CircuitBuilder};
pub use crate::config::NetworkConfig;
pub use crate::crypto::NodeIdentity;
pub use crate::launcher::{launch_network, RunningNetwork};
pub use crate::network::{MemoryTransport, TcpTransport, Transport};
pub use crate::onion::{build_onion, peel_one_layer, LayerContent};
pub use crate::registry::{Registry, RegistryClient, RemoteRegistry};
pub use crate::relay::{OnionRouter, RelayForwarder};
pub use crate::types::{Destination, NodeId, OnionError, RegistryEntry, Result, UserId};
pub use crate::user::{UserNode, UserProcess};

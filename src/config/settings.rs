// src/config/settings.rs
//! Network configuration settings.
//!
//! This module contains the command line surface and the configuration
//! structure shared by the registry, onion routers and users, together with
//! loading, overriding and validation logic.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::defaults;
use crate::types::{NodeId, UserId};

/// Error type for configuration-related operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid host address: {0}")]
    InvalidHost(#[from] std::net::AddrParseError),

    #[error("Port overflow: base {base} + id {id} exceeds 65535")]
    PortOverflow { base: u16, id: u32 },
}

/// Process roles
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the node registry
    Registry,

    /// Run an onion router
    Relay {
        /// Node identifier (listens on base relay port + id)
        #[clap(long)]
        node_id: NodeId,
    },

    /// Run a user endpoint
    User {
        /// User identifier (listens on base user port + id)
        #[clap(long)]
        user_id: UserId,
    },

    /// Ask a running user to send a message through a fresh circuit
    Send {
        /// Sending user
        #[clap(long)]
        from: UserId,

        /// Destination user
        #[clap(long)]
        to: UserId,

        /// Message text
        #[clap(long)]
        message: String,
    },

    /// Start a registry, relays and users in one process
    Launch {
        /// Number of onion routers
        #[clap(long, default_value_t = 3)]
        relays: u32,

        /// Number of users
        #[clap(long, default_value_t = 2)]
        users: u32,
    },
}

/// Command line arguments
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "onionet",
    about = "Minimal onion routing overlay: registry, relays and users",
    version,
    author
)]
pub struct Args {
    /// Log level
    #[clap(long, global = true, default_value = defaults::DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Optional log file (daily rolling) in addition to stdout
    #[clap(long, global = true)]
    pub log_file: Option<String>,

    /// JSON configuration file
    #[clap(long, global = true)]
    pub config_file: Option<String>,

    /// Host every process binds to and connects to [default: 127.0.0.1]
    #[clap(long, global = true)]
    pub host: Option<String>,

    /// Registry port [default: 8080]
    #[clap(long, global = true)]
    pub registry_port: Option<u16>,

    /// Base port for onion routers [default: 4000]
    #[clap(long, global = true)]
    pub base_relay_port: Option<u16>,

    /// Base port for users [default: 3000]
    #[clap(long, global = true)]
    pub base_user_port: Option<u16>,

    /// Number of relays per circuit [default: 3]
    #[clap(long, global = true)]
    pub path_length: Option<usize>,

    #[clap(subcommand)]
    pub command: Command,
}

/// Addressing and circuit settings shared by every process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Host all processes bind to
    pub host: IpAddr,

    /// Registry port
    pub registry_port: u16,

    /// Onion router `n` listens on `base_relay_port + n`
    pub base_relay_port: u16,

    /// User `u` listens on `base_user_port + u`
    pub base_user_port: u16,

    /// Circuit length chosen by senders
    pub path_length: usize,

    /// Connect timeout for outbound requests
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            registry_port: defaults::DEFAULT_REGISTRY_PORT,
            base_relay_port: defaults::DEFAULT_BASE_RELAY_PORT,
            base_user_port: defaults::DEFAULT_BASE_USER_PORT,
            path_length: defaults::DEFAULT_PATH_LENGTH,
            connect_timeout: Duration::from_secs(defaults::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl NetworkConfig {
    /// Build the configuration from command line arguments, layering them
    /// over the config file when one is given.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config_file {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        // Any flag given on the command line wins over the file
        if let Some(host) = &args.host {
            config.host = host.parse()?;
        }
        if let Some(port) = args.registry_port {
            config.registry_port = port;
        }
        if let Some(port) = args.base_relay_port {
            config.base_relay_port = port;
        }
        if let Some(port) = args.base_user_port {
            config.base_user_port = port;
        }
        if let Some(path_length) = args.path_length {
            config.path_length = path_length;
        }

        config.validate()?;
        debug!("Network configuration: {:?}", config);
        Ok(config)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path_length == 0 {
            return Err(ConfigError::Invalid(
                "Path length must be at least 1".to_string(),
            ));
        }

        if self.registry_port == 0 || self.base_relay_port == 0 || self.base_user_port == 0 {
            return Err(ConfigError::Invalid("Ports must be non-zero".to_string()));
        }

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "Connect timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Registry socket address
    pub fn registry_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.registry_port)
    }

    /// Socket address of onion router `node_id`
    pub fn relay_addr(&self, node_id: NodeId) -> Result<SocketAddr, ConfigError> {
        offset_port(self.base_relay_port, node_id).map(|port| SocketAddr::new(self.host, port))
    }

    /// Socket address of user `user_id`
    pub fn user_addr(&self, user_id: UserId) -> Result<SocketAddr, ConfigError> {
        offset_port(self.base_user_port, user_id).map(|port| SocketAddr::new(self.host, port))
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    /// Load configuration from a file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

fn offset_port(base: u16, id: u32) -> Result<u16, ConfigError> {
    u16::try_from(id)
        .ok()
        .and_then(|offset| base.checked_add(offset))
        .ok_or(ConfigError::PortOverflow { base, id })
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

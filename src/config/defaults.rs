// src/config/defaults.rs
//! Default configuration values for the overlay processes.

/// Default bind host for every process
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default registry port
pub const DEFAULT_REGISTRY_PORT: u16 = 8080;

/// Onion router `n` listens on this port plus `n`
pub const DEFAULT_BASE_RELAY_PORT: u16 = 4000;

/// User `u` listens on this port plus `u`
pub const DEFAULT_BASE_USER_PORT: u16 = 3000;

/// Default circuit length
pub const DEFAULT_PATH_LENGTH: usize = 3;

/// Default connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

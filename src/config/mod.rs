// src/config/mod.rs
//! Configuration module for the onion routing overlay.
//!
//! This module manages network settings, constants, and default configurations.

pub mod constants;
pub mod defaults;
pub mod settings;

pub use settings::{Args, Command, ConfigError, NetworkConfig};

// src/registry/mod.rs
//! Node registry: the directory of relays and their public keys.

pub mod client;
pub mod service;

// Re-export commonly used items
pub use client::{RegistryClient, RemoteRegistry};
pub use service::{Registry, RegistrationError};

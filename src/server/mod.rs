// src/server/mod.rs
//! Server module shared by the registry, onion routers and users.
//!
//! This module provides the listener lifecycle, per-connection request
//! handling and the handler trait each process role implements.

pub mod connection;
pub mod core;
pub mod handler;

// Re-export commonly used items
pub use self::core::{NodeServer, ServerError, ServerState};
pub use connection::handle_connection;
pub use handler::{dispatch, unsupported, RequestHandler};

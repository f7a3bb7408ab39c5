// src/network/mod.rs
//! Network module for moving requests between overlay processes.
//!
//! This module provides the transport abstraction and its TCP and
//! in-memory implementations.

pub mod transport;

// Re-export commonly used items
pub use transport::{call, framed, MemoryTransport, TcpTransport, Transport, TransportError};

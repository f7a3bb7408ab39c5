// src/relay/mod.rs
//! Onion routers: peel one layer, pass the rest on.

pub mod forwarder;
pub mod router;

// Re-export commonly used items
pub use forwarder::{RelayForwarder, RelayOutcome, RelayState};
pub use router::OnionRouter;

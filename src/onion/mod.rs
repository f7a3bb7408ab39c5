// src/onion/mod.rs
//! Onion envelope: nested per-hop encryption of a message and its route.
//!
//! A sender wraps the message once per relay, innermost hop first. Each
//! relay peels exactly one layer with its private key and learns only the
//! next hop (or, at the last hop, the destination user and plaintext).

pub mod codec;
pub mod envelope;

pub use codec::{build_onion, peel_one_layer, validate_path};
pub use envelope::{LayerContent, OnionLayer};

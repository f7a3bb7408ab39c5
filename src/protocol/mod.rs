// src/protocol/mod.rs
//! Protocol module for inter-process messages.
//!
//! Defines the request/response messages and their framing.

pub mod serialization;
pub mod types;

// Re-export commonly used items
pub use serialization::{decode_request, decode_response, encode_request, encode_response, request_name};
pub use types::{MessageError, Request, Response};

// src/protocol/types.rs
//! Request and response messages exchanged between overlay processes.
//!
//! Registry, onion routers and users all speak the same tagged JSON
//! messages; each role answers the subset that concerns it and returns a
//! 404-style error for the rest.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::constants::STATUS_INTERNAL;
use crate::types::{Destination, NodeId, OnionError, RegistryEntry, UserId};

/// Error type for protocol message handling
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Message too large")]
    MessageTooLarge,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Requests understood by overlay processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Liveness check (every role)
    Status,

    /// Registry: add a node
    RegisterNode { node_id: NodeId, pub_key: String },

    /// Registry: list every registered node
    GetNodeRegistry,

    /// Relay: an onion layer to peel and pass on
    Onion { layer: String },

    /// User: final-hop delivery into the inbox
    Deliver { message: String },

    /// User: build a circuit and send `message` to `destination_user_id`
    SendMessage {
        message: String,
        destination_user_id: UserId,
    },

    /// Relay diagnostics
    GetLastReceivedEncryptedMessage,
    GetLastReceivedDecryptedMessage,
    GetLastMessageDestination,

    /// User diagnostics
    GetLastReceivedMessage,
    GetLastSentMessage,
    GetLastCircuit,
}

/// Responses returned by overlay processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Live,
    Ok,
    Nodes { nodes: Vec<RegistryEntry> },
    Text { result: Option<String> },
    Destination { result: Option<Destination> },
    Circuit { result: Vec<NodeId> },
    Error { code: u16, message: String },
}

impl Response {
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }

    /// Turn an error response into `OnionError::Remote`
    pub fn into_result(self) -> Result<Response, OnionError> {
        match self {
            Response::Error { code, message } => Err(OnionError::Remote { code, message }),
            other => Ok(other),
        }
    }

    /// Expect a plain acknowledgement
    pub fn expect_ok(self) -> Result<(), OnionError> {
        match self.into_result()? {
            Response::Ok => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Response::error(STATUS_INTERNAL, "internal error")
    }
}

pub(crate) fn unexpected(response: &Response) -> OnionError {
    OnionError::Protocol(MessageError::UnexpectedResponse(format!("{:?}", response)))
}

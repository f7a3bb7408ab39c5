// src/types.rs
//! Shared identifiers, registry records and the crate-wide error type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;
use crate::crypto::encryption::EncryptionError;
use crate::crypto::keys::KeyError;
use crate::protocol::MessageError;
use crate::server::ServerError;

/// Identifier of an onion router in the registry
pub type NodeId = u32;

/// Identifier of an end user
pub type UserId = u32;

/// Public projection of a node identity, as held by the registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    /// Node identifier
    pub node_id: NodeId,
    /// Node's X25519 public key (base64)
    pub pub_key: String,
}

impl RegistryEntry {
    pub fn new(node_id: NodeId, pub_key: impl Into<String>) -> Self {
        Self {
            node_id,
            pub_key: pub_key.into(),
        }
    }
}

/// Where a relay sent the last message it handled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Destination {
    /// Forwarded to another onion router
    Relay(NodeId),
    /// Delivered to the final user
    User(UserId),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Relay(id) => write!(f, "relay {}", id),
            Destination::User(id) => write!(f, "user {}", id),
        }
    }
}

/// Error types for onion routing operations
#[derive(thiserror::Error, Debug)]
pub enum OnionError {
    #[error("Key format error: {0}")]
    KeyFormat(String),

    #[error("Decryption failed")]
    Decryption,

    #[error("Integrity check failed")]
    Integrity,

    #[error("Malformed onion envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Insufficient nodes: requested {requested}, available {available}")]
    InsufficientNodes { requested: usize, available: usize },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote error {code}: {message}")]
    Remote { code: u16, message: String },

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] MessageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OnionError {
    /// True for failures that mean "this layer was not ours or was tampered with".
    /// Relays drop such messages without telling the sender why.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            OnionError::Decryption
                | OnionError::Integrity
                | OnionError::MalformedEnvelope(_)
                | OnionError::KeyFormat(_)
        )
    }
}

impl From<KeyError> for OnionError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::Format(msg) => OnionError::KeyFormat(msg),
            KeyError::Decryption => OnionError::Decryption,
            other => OnionError::Crypto(other.to_string()),
        }
    }
}

impl From<EncryptionError> for OnionError {
    fn from(err: EncryptionError) -> Self {
        match err {
            EncryptionError::AuthenticationFailed => OnionError::Integrity,
            EncryptionError::InvalidKeyLength(len) => {
                OnionError::KeyFormat(format!("symmetric key must be 32 bytes, got {}", len))
            }
            EncryptionError::InvalidFormat(msg) => OnionError::MalformedEnvelope(msg),
            other => OnionError::Crypto(other.to_string()),
        }
    }
}

/// Result type for onion routing operations
pub type Result<T> = std::result::Result<T, OnionError>;

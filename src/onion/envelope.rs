// src/onion/envelope.rs
//! Text encoding of onion layers and of their decrypted bodies.
//!
//! Wire layer:   `<sealedKeyB64>:<ivB64>:<ciphertextB64>`
//! Layer body:   `relay:<nodeId>:<innerLayer>` or `final:<userId>:<plaintextB64>`
//!
//! Standard base64 never produces `:`, so splitting is unambiguous; a body
//! is split at most three ways because the inner layer contains separators.

use crate::config::constants::{FIELD_SEPARATOR, FINAL_MARKER, RELAY_MARKER};
use crate::crypto::Iv;
use crate::types::{NodeId, OnionError, Result, UserId};

/// One onion layer as it travels between hops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnionLayer {
    /// Hop key sealed to the processing relay's public key
    pub encrypted_key: Vec<u8>,
    /// IV of the symmetric encryption
    pub iv: Iv,
    /// AES-GCM ciphertext of the encoded `LayerContent`
    pub encrypted_payload: Vec<u8>,
}

impl OnionLayer {
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            base64::encode(&self.encrypted_key),
            self.iv.to_base64(),
            base64::encode(&self.encrypted_payload),
            sep = FIELD_SEPARATOR
        )
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut parts = text.split(FIELD_SEPARATOR);
        let (key, iv, payload) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(iv), Some(payload), None) => (key, iv, payload),
            _ => {
                return Err(OnionError::MalformedEnvelope(
                    "expected three layer fields".into(),
                ))
            }
        };

        Ok(Self {
            encrypted_key: decode_field(key, "encrypted key")?,
            iv: Iv::from_base64(iv)?,
            encrypted_payload: decode_field(payload, "encrypted payload")?,
        })
    }
}

/// Decrypted body of a layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerContent {
    /// Send `inner` (an encoded `OnionLayer`) on to relay `next_hop`
    Forward { next_hop: NodeId, inner: String },
    /// Last hop: hand `plaintext` to user `destination`
    Deliver { destination: UserId, plaintext: String },
}

impl LayerContent {
    pub fn encode(&self) -> String {
        match self {
            LayerContent::Forward { next_hop, inner } => {
                format!("{RELAY_MARKER}{FIELD_SEPARATOR}{next_hop}{FIELD_SEPARATOR}{inner}")
            }
            LayerContent::Deliver { destination, plaintext } => format!(
                "{FINAL_MARKER}{FIELD_SEPARATOR}{destination}{FIELD_SEPARATOR}{}",
                base64::encode(plaintext.as_bytes())
            ),
        }
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut parts = text.splitn(3, FIELD_SEPARATOR);
        let (marker, id, rest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(marker), Some(id), Some(rest)) => (marker, id, rest),
            _ => return Err(OnionError::MalformedEnvelope("truncated layer body".into())),
        };

        let id: u32 = id
            .parse()
            .map_err(|_| OnionError::MalformedEnvelope(format!("invalid hop id {:?}", id)))?;

        match marker {
            RELAY_MARKER => {
                if rest.is_empty() {
                    return Err(OnionError::MalformedEnvelope("empty inner layer".into()));
                }
                Ok(LayerContent::Forward {
                    next_hop: id,
                    inner: rest.to_string(),
                })
            }
            FINAL_MARKER => {
                let bytes = decode_field(rest, "plaintext")?;
                let plaintext = String::from_utf8(bytes)
                    .map_err(|_| OnionError::MalformedEnvelope("plaintext is not UTF-8".into()))?;
                Ok(LayerContent::Deliver {
                    destination: id,
                    plaintext,
                })
            }
            other => Err(OnionError::MalformedEnvelope(format!("unknown marker {:?}", other))),
        }
    }
}

fn decode_field(field: &str, name: &str) -> Result<Vec<u8>> {
    base64::decode(field).map_err(|e| OnionError::MalformedEnvelope(format!("invalid {}: {}", name, e)))
}

// src/onion/codec.rs
//! Building and peeling onions.

use std::collections::HashSet;
use tracing::{debug, trace};

use crate::crypto::{decrypt_with_private_key, encrypt_with_public_key, NodePrivateKey, NodePublicKey, SymmetricKey};
use crate::onion::envelope::{LayerContent, OnionLayer};
use crate::types::{OnionError, RegistryEntry, Result, UserId};

/// Reject empty paths and paths that visit a relay twice
pub fn validate_path(path: &[RegistryEntry]) -> Result<()> {
    if path.is_empty() {
        return Err(OnionError::InvalidPath("path must contain at least one relay".into()));
    }

    let mut seen = HashSet::with_capacity(path.len());
    for entry in path {
        if !seen.insert(entry.node_id) {
            return Err(OnionError::InvalidPath(format!(
                "node {} appears more than once",
                entry.node_id
            )));
        }
    }
    Ok(())
}

/// Wrap `plaintext` for `destination` in one layer per relay of `path`.
///
/// Layers are built innermost first; the returned text is the layer for
/// `path[0]` and is what gets sent to the first hop.
pub fn build_onion(path: &[RegistryEntry], destination: UserId, plaintext: &str) -> Result<String> {
    validate_path(path)?;

    // Import every key before encrypting anything
    let keys = path
        .iter()
        .map(|entry| NodePublicKey::from_base64(&entry.pub_key))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut body = LayerContent::Deliver {
        destination,
        plaintext: plaintext.to_string(),
    }
    .encode();

    for position in (1..path.len()).rev() {
        let layer = seal_layer(&keys[position], &body)?;
        body = LayerContent::Forward {
            next_hop: path[position].node_id,
            inner: layer.encode(),
        }
        .encode();
    }

    let outermost = seal_layer(&keys[0], &body)?.encode();
    debug!(
        "Built {}-layer onion for user {} ({} bytes)",
        path.len(),
        destination,
        outermost.len()
    );
    Ok(outermost)
}

/// Remove the layer addressed to the holder of `private_key`.
///
/// Fails with `Decryption` when the layer was sealed to another node,
/// `Integrity` when the payload was modified, and `MalformedEnvelope` when
/// the text does not parse.
pub fn peel_one_layer(private_key: &NodePrivateKey, received: &str) -> Result<LayerContent> {
    let layer = OnionLayer::decode(received)?;

    let key_bytes = decrypt_with_private_key(private_key, &layer.encrypted_key)?;
    let key = SymmetricKey::from_slice(&key_bytes)?;

    let body = key.decrypt(&layer.iv, &layer.encrypted_payload)?;
    let body = String::from_utf8(body)
        .map_err(|_| OnionError::MalformedEnvelope("layer body is not UTF-8".into()))?;

    trace!("Peeled layer: {} byte body", body.len());
    LayerContent::decode(&body)
}

fn seal_layer(public_key: &NodePublicKey, body: &str) -> Result<OnionLayer> {
    let key = SymmetricKey::generate();
    let (iv, encrypted_payload) = key.encrypt(body.as_bytes())?;
    let encrypted_key = encrypt_with_public_key(public_key, key.as_bytes())?;

    Ok(OnionLayer {
        encrypted_key,
        iv,
        encrypted_payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NodeIdentity;
    use quickcheck::quickcheck;

    fn identities(ids: &[u32]) -> Vec<NodeIdentity> {
        ids.iter().map(|id| NodeIdentity::generate(*id)).collect()
    }

    fn entries(nodes: &[NodeIdentity]) -> Vec<RegistryEntry> {
        nodes.iter().map(NodeIdentity::registry_entry).collect()
    }

    /// Peel at every hop in order, checking each forward target
    fn walk(nodes: &[NodeIdentity], onion: String) -> LayerContent {
        let mut current = onion;
        for (position, node) in nodes.iter().enumerate() {
            match peel_one_layer(node.private_key(), &current).unwrap() {
                LayerContent::Forward { next_hop, inner } => {
                    assert_eq!(next_hop, nodes[position + 1].node_id());
                    current = inner;
                }
                delivered => {
                    assert_eq!(position, nodes.len() - 1, "delivered before the last hop");
                    return delivered;
                }
            }
        }
        panic!("onion still had layers after the last hop");
    }

    quickcheck! {
        fn prop_round_trip(message: String, destination: u32) -> bool {
            let nodes = identities(&[1, 3, 2]);
            let onion = build_onion(&entries(&nodes), destination, &message).unwrap();
            walk(&nodes, onion) == LayerContent::Deliver { destination, plaintext: message }
        }
    }

    #[test]
    fn test_single_hop_circuit() {
        let nodes = identities(&[5]);
        let onion = build_onion(&entries(&nodes), 9, "direct").unwrap();
        assert_eq!(
            peel_one_layer(nodes[0].private_key(), &onion).unwrap(),
            LayerContent::Deliver {
                destination: 9,
                plaintext: "direct".into()
            }
        );
    }

    #[test]
    fn test_layer_count_matches_path_length() {
        let nodes = identities(&[1, 2, 3, 4, 5]);
        let onion = build_onion(&entries(&nodes), 1, "five hops").unwrap();
        assert_eq!(
            walk(&nodes, onion),
            LayerContent::Deliver {
                destination: 1,
                plaintext: "five hops".into()
            }
        );
    }

    #[test]
    fn test_wrong_node_cannot_peel() {
        let nodes = identities(&[1, 2, 3]);
        let onion = build_onion(&entries(&nodes), 7, "hello").unwrap();

        // Second and third hops, and an outsider, cannot open the outer layer
        for node in nodes[1..].iter().chain(identities(&[99]).iter()) {
            assert!(matches!(
                peel_one_layer(node.private_key(), &onion),
                Err(OnionError::Decryption)
            ));
        }
    }

    #[test]
    fn test_tampered_payload_fails() {
        let nodes = identities(&[1, 2]);
        let onion = build_onion(&entries(&nodes), 7, "hello").unwrap();
        let layer = OnionLayer::decode(&onion).unwrap();

        for i in 0..layer.encrypted_payload.len() {
            let mut tampered = layer.clone();
            tampered.encrypted_payload[i] ^= 0x01;
            assert!(matches!(
                peel_one_layer(nodes[0].private_key(), &tampered.encode()),
                Err(OnionError::Integrity)
            ));
        }
    }

    #[test]
    fn test_tampered_key_fails() {
        let nodes = identities(&[1, 2]);
        let onion = build_onion(&entries(&nodes), 7, "hello").unwrap();
        let layer = OnionLayer::decode(&onion).unwrap();

        for i in 0..layer.encrypted_key.len() {
            let mut tampered = layer.clone();
            tampered.encrypted_key[i] ^= 0x01;
            assert!(matches!(
                peel_one_layer(nodes[0].private_key(), &tampered.encode()),
                Err(OnionError::Decryption)
            ));
        }
    }

    #[test]
    fn test_tampered_inner_layer_fails_at_its_hop() {
        let nodes = identities(&[1, 2]);
        let onion = build_onion(&entries(&nodes), 7, "hello").unwrap();

        let inner = match peel_one_layer(nodes[0].private_key(), &onion).unwrap() {
            LayerContent::Forward { inner, .. } => inner,
            other => panic!("expected forward, got {:?}", other),
        };

        let mut layer = OnionLayer::decode(&inner).unwrap();
        layer.encrypted_payload[0] ^= 0xff;
        assert!(peel_one_layer(nodes[1].private_key(), &layer.encode()).is_err());
    }

    #[test]
    fn test_invalid_paths() {
        assert!(matches!(build_onion(&[], 1, "x"), Err(OnionError::InvalidPath(_))));

        let nodes = identities(&[1, 2]);
        let mut path = entries(&nodes);
        path.push(path[0].clone());
        assert!(matches!(build_onion(&path, 1, "x"), Err(OnionError::InvalidPath(_))));
    }

    #[test]
    fn test_malformed_registry_key() {
        let path = vec![RegistryEntry::new(1, "not-a-key")];
        assert!(matches!(build_onion(&path, 1, "x"), Err(OnionError::KeyFormat(_))));
    }

    #[test]
    fn test_low_order_registry_key() {
        let path = vec![RegistryEntry::new(1, base64::encode([0u8; 32]))];
        assert!(matches!(build_onion(&path, 1, "x"), Err(OnionError::KeyFormat(_))));
    }

    #[test]
    fn test_garbage_input_is_malformed() {
        let node = NodeIdentity::generate(1);
        assert!(matches!(
            peel_one_layer(node.private_key(), "hello there"),
            Err(OnionError::MalformedEnvelope(_))
        ));
    }
}

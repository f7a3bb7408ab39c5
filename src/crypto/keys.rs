// src/crypto/keys.rs
//! Node key pairs and public-key sealing of short secrets.
//!
//! Every onion router owns one X25519 key pair for its whole lifetime. The
//! public half is published through the registry; the private half never
//! leaves the process. Public-key encryption is a sealed box: an ephemeral
//! X25519 key agrees a secret with the recipient, HKDF-SHA256 stretches it,
//! and ChaCha20-Poly1305 encrypts the payload. It is only ever used for the
//! 32-byte per-hop symmetric keys.

use chacha20poly1305::aead::{Aead, NewAead};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret as X25519SecretKey};

use crate::config::constants::{KEY_SIZE, MAX_SEALED_PLAINTEXT, NONCE_SIZE, SEAL_KDF_INFO, SEAL_OVERHEAD};
use crate::types::{NodeId, RegistryEntry};

/// Error type for key-related operations
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key format error: {0}")]
    Format(String),

    #[error("Decryption failed")]
    Decryption,

    #[error("Plaintext too large for sealing: {0} bytes")]
    PlaintextTooLarge(usize),

    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

/// Public half of a node key pair
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NodePublicKey(X25519PublicKey);

impl NodePublicKey {
    /// Build from raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(X25519PublicKey::from(bytes))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Serialize to standard base64
    pub fn to_base64(&self) -> String {
        base64::encode(self.as_bytes())
    }

    /// Import a base64 public key; low-order points are refused
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let key = Self::from_bytes(decode_key_bytes(encoded)?);
        key.validate()?;
        Ok(key)
    }

    /// Reject low-order points, which force an all-zero shared secret
    pub fn validate(&self) -> Result<(), KeyError> {
        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        if ephemeral.diffie_hellman(&self.0).was_contributory() {
            Ok(())
        } else {
            Err(KeyError::Format("low-order public key".into()))
        }
    }

    /// Short fingerprint for logs
    pub fn fingerprint(&self) -> String {
        let hash = Sha256::digest(self.as_bytes());
        hex::encode(&hash[0..4])
    }
}

impl fmt::Debug for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePublicKey({})", self.fingerprint())
    }
}

impl fmt::Display for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Private half of a node key pair
#[derive(Clone)]
pub struct NodePrivateKey(X25519SecretKey);

impl NodePrivateKey {
    /// Derive the matching public key
    pub fn public_key(&self) -> NodePublicKey {
        NodePublicKey(X25519PublicKey::from(&self.0))
    }

    /// Serialize to standard base64
    pub fn to_base64(&self) -> String {
        base64::encode(self.0.to_bytes())
    }

    /// Import a base64 private key
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        decode_key_bytes(encoded).map(|bytes| Self(X25519SecretKey::from(bytes)))
    }
}

impl fmt::Debug for NodePrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodePrivateKey(..)")
    }
}

/// Generate a fresh X25519 key pair
pub fn generate_key_pair() -> (NodePublicKey, NodePrivateKey) {
    let private_key = NodePrivateKey(X25519SecretKey::random_from_rng(OsRng));
    (private_key.public_key(), private_key)
}

/// Identity of one onion router, created once at startup
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    node_id: NodeId,
    public_key: NodePublicKey,
    private_key: NodePrivateKey,
}

impl NodeIdentity {
    /// Generate a new identity for `node_id`
    pub fn generate(node_id: NodeId) -> Self {
        let (public_key, private_key) = generate_key_pair();
        info!("Node {} public key fingerprint: {}", node_id, public_key.fingerprint());
        Self {
            node_id,
            public_key,
            private_key,
        }
    }

    /// Rebuild an identity from an exported private key
    pub fn from_private_key(node_id: NodeId, private_key: NodePrivateKey) -> Self {
        Self {
            node_id,
            public_key: private_key.public_key(),
            private_key,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn public_key(&self) -> &NodePublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &NodePrivateKey {
        &self.private_key
    }

    /// The record published to the registry
    pub fn registry_entry(&self) -> RegistryEntry {
        RegistryEntry::new(self.node_id, self.public_key.to_base64())
    }
}

/// Seal a short secret to `public_key`.
///
/// Output layout: `ephemeral_public(32) || nonce(12) || ciphertext+tag`.
pub fn encrypt_with_public_key(public_key: &NodePublicKey, plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
    if plaintext.len() > MAX_SEALED_PLAINTEXT {
        return Err(KeyError::PlaintextTooLarge(plaintext.len()));
    }

    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&public_key.0);
    if !shared.was_contributory() {
        return Err(KeyError::Format("low-order public key".into()));
    }

    let key = derive_seal_key(shared.as_bytes(), ephemeral_public.as_bytes(), public_key.as_bytes())?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| KeyError::Crypto(format!("ChaCha20-Poly1305 sealing failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(SEAL_OVERHEAD + plaintext.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed box with the node's private key.
///
/// Any mismatch (wrong key, truncated or modified data) yields
/// `KeyError::Decryption`; garbage plaintext is never returned.
pub fn decrypt_with_private_key(private_key: &NodePrivateKey, sealed: &[u8]) -> Result<Vec<u8>, KeyError> {
    if sealed.len() < SEAL_OVERHEAD {
        debug!("Sealed box too short: {} bytes", sealed.len());
        return Err(KeyError::Decryption);
    }

    let mut ephemeral_bytes = [0u8; KEY_SIZE];
    ephemeral_bytes.copy_from_slice(&sealed[..KEY_SIZE]);
    let ephemeral_public = X25519PublicKey::from(ephemeral_bytes);
    let nonce = &sealed[KEY_SIZE..KEY_SIZE + NONCE_SIZE];
    let ciphertext = &sealed[KEY_SIZE + NONCE_SIZE..];

    let shared = private_key.0.diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        debug!("Rejected non-contributory ephemeral key");
        return Err(KeyError::Decryption);
    }

    let recipient_public = private_key.public_key();
    let key = derive_seal_key(shared.as_bytes(), &ephemeral_bytes, recipient_public.as_bytes())?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| KeyError::Decryption)
}

/// HKDF-SHA256 over the ECDH output, salted with both public keys
fn derive_seal_key(
    shared_secret: &[u8],
    ephemeral_public: &[u8; KEY_SIZE],
    recipient_public: &[u8; KEY_SIZE],
) -> Result<[u8; KEY_SIZE], KeyError> {
    let mut salt = [0u8; KEY_SIZE * 2];
    salt[..KEY_SIZE].copy_from_slice(ephemeral_public);
    salt[KEY_SIZE..].copy_from_slice(recipient_public);

    let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut output = [0u8; KEY_SIZE];
    hkdf.expand(SEAL_KDF_INFO, &mut output)
        .map_err(|_| KeyError::Crypto("HKDF expansion failed".into()))?;
    Ok(output)
}

fn decode_key_bytes(encoded: &str) -> Result<[u8; KEY_SIZE], KeyError> {
    let bytes = base64::decode(encoded.trim())
        .map_err(|e| KeyError::Format(format!("Invalid base64 key: {}", e)))?;
    <[u8; KEY_SIZE]>::try_from(bytes.as_slice())
        .map_err(|_| KeyError::Format(format!("Invalid key length: {} bytes (expected {})", bytes.len(), KEY_SIZE)))
}

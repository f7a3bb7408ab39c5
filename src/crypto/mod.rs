// src/crypto/mod.rs
//! Cryptography module for the onion routing overlay.
//!
//! `keys` holds node identities and public-key sealing of hop keys;
//! `encryption` holds the per-hop authenticated symmetric cipher.

pub mod encryption;
pub mod keys;

// Re-export commonly used items
pub use encryption::{EncryptionError, Iv, SymmetricKey};
pub use keys::{
    decrypt_with_private_key, encrypt_with_public_key, generate_key_pair, KeyError, NodeIdentity,
    NodePrivateKey, NodePublicKey,
};

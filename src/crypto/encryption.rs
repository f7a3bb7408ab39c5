// src/crypto/encryption.rs
//! Per-hop symmetric encryption.
//!
//! Each onion layer body is encrypted with its own AES-256-GCM key. A fresh
//! random 12-byte IV is drawn for every call and travels next to the
//! ciphertext; the GCM tag makes any modification of key, IV or ciphertext
//! fail decryption instead of producing garbage.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesGcmNonce,
};
use generic_array::GenericArray;
use rand::RngCore;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::constants::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Error type for encryption operations
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed")]
    AuthenticationFailed,
}

/// AES-256-GCM session key for one hop
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_SIZE]);

/// Initialization vector sent alongside a ciphertext
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Iv([u8; NONCE_SIZE]);

impl SymmetricKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, EncryptionError> {
        <[u8; KEY_SIZE]>::try_from(bytes)
            .map(Self)
            .map_err(|_| EncryptionError::InvalidKeyLength(bytes.len()))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64::encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, EncryptionError> {
        let bytes = base64::decode(encoded)
            .map_err(|e| EncryptionError::InvalidFormat(format!("Invalid base64 key: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Encrypt `plaintext` under a fresh random IV
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Iv, Vec<u8>), EncryptionError> {
        let iv = Iv::random();
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.0));

        let ciphertext = cipher
            .encrypt(AesGcmNonce::from_slice(&iv.0), plaintext)
            .map_err(|e| EncryptionError::EncryptionFailed(format!("AES-GCM encryption failed: {}", e)))?;

        trace!(
            "AES-GCM encryption: plaintext={} bytes, ciphertext={} bytes",
            plaintext.len(),
            ciphertext.len()
        );
        Ok((iv, ciphertext))
    }

    /// Decrypt and verify `ciphertext`
    pub fn decrypt(&self, iv: &Iv, ciphertext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        if ciphertext.len() < TAG_SIZE {
            return Err(EncryptionError::AuthenticationFailed);
        }

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.0));
        cipher
            .decrypt(AesGcmNonce::from_slice(&iv.0), ciphertext)
            .map_err(|_| {
                // May indicate tampering or a key/iv mismatch
                debug!("AES-GCM authentication failed for {} byte ciphertext", ciphertext.len());
                EncryptionError::AuthenticationFailed
            })
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl Iv {
    pub fn random() -> Self {
        let mut iv = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        Self(iv)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64::encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, EncryptionError> {
        let bytes = base64::decode(encoded)
            .map_err(|e| EncryptionError::InvalidFormat(format!("Invalid base64 iv: {}", e)))?;
        <[u8; NONCE_SIZE]>::try_from(bytes.as_slice())
            .map(Self)
            .map_err(|_| {
                EncryptionError::InvalidFormat(format!(
                    "Invalid iv length: {} (expected {})",
                    bytes.len(),
                    NONCE_SIZE
                ))
            })
    }
}

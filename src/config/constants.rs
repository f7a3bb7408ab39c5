// src/config/constants.rs
//! Protocol constants and fixed settings.
//!
//! This module contains fixed values used throughout the overlay, such as
//! key sizes, frame limits and the onion wire markers.

use std::time::Duration;

/// Cryptographic constants
pub const KEY_SIZE: usize = 32; // X25519 keys and AES-256 keys
pub const NONCE_SIZE: usize = 12; // AES-GCM iv and ChaCha20-Poly1305 nonce
pub const TAG_SIZE: usize = 16;

/// Sealed box layout: ephemeral public key, nonce, ciphertext + tag
pub const SEAL_OVERHEAD: usize = KEY_SIZE + NONCE_SIZE + TAG_SIZE;

/// Only symmetric keys are ever sealed to a node key
pub const MAX_SEALED_PLAINTEXT: usize = 64;

/// HKDF info string for sealed-box key derivation
pub const SEAL_KDF_INFO: &[u8] = b"ONIONET-SEALED-KEY-V1";

/// Onion envelope encoding
pub const FIELD_SEPARATOR: char = ':';
pub const RELAY_MARKER: &str = "relay";
pub const FINAL_MARKER: &str = "final";

/// Maximum allowed frame size (1MB)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Network constants
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Coarse status codes returned to peers
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_INTERNAL: u16 = 500;
pub const STATUS_BAD_GATEWAY: u16 = 502;

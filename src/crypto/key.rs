//! Device-bound key derivation.
//!
//! The AES key is the first 32 characters of the base64-encoded SHA-256
//! of `product_id ++ device_id`. The same product on another machine
//! derives a different key, so a copied record cannot be decrypted there.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use std::fmt;

/// AES-256 key length in bytes.
pub const KEY_SIZE: usize = 32;

/// Symmetric key derived from product and device identifiers.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Derive the at-rest encryption key for a product on a device.
pub fn derive_key(product_id: &str, device_id: &str) -> DerivedKey {
    let mut hasher = Sha256::new();
    hasher.update(product_id.as_bytes());
    hasher.update(device_id.as_bytes());
    let encoded = STANDARD.encode(hasher.finalize());

    // 32 digest bytes encode to 44 base64 characters.
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&encoded.as_bytes()[..KEY_SIZE]);
    DerivedKey(key)
}

/// Short, non-reversible fingerprint of a license key for log fields.
pub fn key_fingerprint(license_key: &str) -> String {
    let hash = Sha256::digest(license_key.as_bytes());
    hex::encode(&hash[..6])
}

//! AES-256-CBC encryption of the license key at rest.
//!
//! Each call draws a fresh 16-byte IV from the OS RNG. The IV is not
//! secret and travels next to the ciphertext. The plaintext is prefixed
//! with an 8-byte SHA-256 check value so that a wrong key or a wrong IV
//! is reported as [`LicenseError::DecryptionError`] instead of decoding
//! to garbage.

use crate::crypto::key::DerivedKey;
use crate::LicenseError;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// IV length in bytes.
pub const IV_SIZE: usize = 16;

/// AES block length in bytes.
pub const BLOCK_SIZE: usize = 16;

const CHECK_SIZE: usize = 8;

/// Ciphertext and the IV needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKey {
    /// Encrypted bytes (PKCS#7 padded, multiple of [`BLOCK_SIZE`]).
    pub ciphertext: Vec<u8>,
    /// Initialization vector used for this ciphertext.
    pub iv: [u8; IV_SIZE],
}

impl EncryptedKey {
    /// Hex-encoded `(ciphertext, iv)` for persistence.
    pub fn to_hex(&self) -> (String, String) {
        (hex::encode(&self.ciphertext), hex::encode(self.iv))
    }

    /// Decode from the hex pair produced by [`EncryptedKey::to_hex`].
    pub fn from_hex(ciphertext: &str, iv: &str) -> Result<Self, LicenseError> {
        let ciphertext = hex::decode(ciphertext)
            .map_err(|e| LicenseError::DecryptionError(format!("ciphertext is not hex: {}", e)))?;
        let iv_bytes = hex::decode(iv)
            .map_err(|e| LicenseError::DecryptionError(format!("iv is not hex: {}", e)))?;
        let iv: [u8; IV_SIZE] = iv_bytes.as_slice().try_into().map_err(|_| {
            LicenseError::DecryptionError(format!(
                "iv must be {} bytes, got {}",
                IV_SIZE,
                iv_bytes.len()
            ))
        })?;
        Ok(Self { ciphertext, iv })
    }
}

fn check_value(plaintext: &[u8]) -> [u8; CHECK_SIZE] {
    let hash = Sha256::digest(plaintext);
    let mut check = [0u8; CHECK_SIZE];
    check.copy_from_slice(&hash[..CHECK_SIZE]);
    check
}

/// Encrypt a license key under a freshly generated IV.
pub fn encrypt(plaintext: &str, key: &DerivedKey) -> Result<EncryptedKey, LicenseError> {
    if plaintext.is_empty() {
        return Err(LicenseError::EncryptionError(
            "refusing to encrypt an empty key".to_string(),
        ));
    }

    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let mut framed = Vec::with_capacity(CHECK_SIZE + plaintext.len());
    framed.extend_from_slice(&check_value(plaintext.as_bytes()));
    framed.extend_from_slice(plaintext.as_bytes());

    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), (&iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(&framed);

    Ok(EncryptedKey { ciphertext, iv })
}

/// Decrypt a license key.
///
/// # Errors
/// `DecryptionError` on malformed ciphertext, bad padding, a failed
/// check value, or non-UTF-8 output.
pub fn decrypt(encrypted: &EncryptedKey, key: &DerivedKey) -> Result<String, LicenseError> {
    let len = encrypted.ciphertext.len();
    if len == 0 || len % BLOCK_SIZE != 0 {
        return Err(LicenseError::DecryptionError(format!(
            "ciphertext length {} is not a positive multiple of {}",
            len, BLOCK_SIZE
        )));
    }

    let framed = Aes256CbcDec::new(key.as_bytes().into(), (&encrypted.iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(&encrypted.ciphertext)
        .map_err(|_| {
            LicenseError::DecryptionError("bad padding (wrong key or corrupted data)".to_string())
        })?;

    if framed.len() <= CHECK_SIZE {
        return Err(LicenseError::DecryptionError("plaintext too short".to_string()));
    }
    let (check, plaintext) = framed.split_at(CHECK_SIZE);
    if check != check_value(plaintext) {
        return Err(LicenseError::DecryptionError(
            "check value mismatch (wrong key or iv)".to_string(),
        ));
    }

    String::from_utf8(plaintext.to_vec())
        .map_err(|e| LicenseError::DecryptionError(format!("invalid UTF-8: {}", e)))
}

//! Persisted trust record format.
//!
//! ```json
//! {
//!   "key": { "encoding": "aes256cbc", "ciphertext": "<hex>", "iv": "<hex>" },
//!   "lastCheckAttempt": "2025-01-15T12:00:00Z",
//!   "lastCheckSuccess": "2025-01-15T12:00:00Z",
//!   "purchase": { "refunded": false, ... }
//! }
//! ```
//!
//! On load the record is schema-checked:
//! 1. `lastCheckAttempt >= lastCheckSuccess` when both are set
//! 2. A plain key is non-empty
//!
//! Encrypted key material is not inspected here. A malformed ciphertext or
//! IV is corrupted local state and is reported by decryption instead.

use crate::crypto::cipher::EncryptedKey;
use crate::protocol::models::Purchase;
use crate::LicenseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// License key as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "lowercase")]
pub enum StoredKey {
    /// Plain text (encryption disabled).
    Plain {
        /// The license key.
        value: String,
    },
    /// AES-256-CBC ciphertext and IV, hex-encoded.
    Aes256cbc {
        /// Hex ciphertext.
        ciphertext: String,
        /// Hex IV.
        iv: String,
    },
}

impl StoredKey {
    /// Wrap freshly encrypted key material.
    pub fn encrypted(key: &EncryptedKey) -> Self {
        let (ciphertext, iv) = key.to_hex();
        StoredKey::Aes256cbc { ciphertext, iv }
    }

    /// Whether the key is stored encrypted.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, StoredKey::Aes256cbc { .. })
    }

    fn validate(&self) -> Result<(), LicenseError> {
        match self {
            StoredKey::Plain { value } if value.trim().is_empty() => Err(
                LicenseError::StoreInvalid("stored key is empty".to_string()),
            ),
            // Ciphertext and IV are checked at decryption time so that
            // corruption surfaces as `DecryptionError`.
            _ => Ok(()),
        }
    }
}

/// Last known verification state for one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustRecord {
    /// Stored license key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<StoredKey>,

    /// Start of the most recent verification attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_attempt: Option<DateTime<Utc>>,

    /// Most recent verification that came back valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_success: Option<DateTime<Utc>>,

    /// Purchase snapshot from the last valid verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase: Option<Purchase>,
}

impl TrustRecord {
    /// Schema check applied on every load and save.
    pub fn validate(&self) -> Result<(), LicenseError> {
        if let (Some(attempt), Some(success)) = (self.last_check_attempt, self.last_check_success) {
            if attempt < success {
                return Err(LicenseError::StoreInvalid(format!(
                    "lastCheckAttempt {} precedes lastCheckSuccess {}",
                    attempt.to_rfc3339(),
                    success.to_rfc3339()
                )));
            }
        }
        if let Some(key) = &self.key {
            key.validate()?;
        }
        Ok(())
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        *self == TrustRecord::default()
    }

    /// Serialize the record to JSON.
    pub fn to_json(&self) -> Result<String, LicenseError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LicenseError::StoreIO(format!("Failed to serialize record: {}", e)))
    }

    /// Deserialize and validate a record.
    pub fn from_json(json: &str) -> Result<Self, LicenseError> {
        let record: Self = serde_json::from_str(json)
            .map_err(|e| LicenseError::StoreInvalid(format!("Failed to parse record: {}", e)))?;
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::encrypt;
    use crate::crypto::key::derive_key;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn purchase() -> Purchase {
        serde_json::from_str(r#"{"product_id":"prod","refunded":false,"sale_id":"s1"}"#).unwrap()
    }

    #[test]
    fn test_record_roundtrip_encrypted() {
        let encrypted = encrypt("ABC-123", &derive_key("prod", "dev")).unwrap();
        let record = TrustRecord {
            key: Some(StoredKey::encrypted(&encrypted)),
            last_check_attempt: Some(now()),
            last_check_success: Some(now()),
            purchase: Some(purchase()),
        };

        let json = record.to_json().unwrap();
        assert!(json.contains("\"encoding\": \"aes256cbc\""));
        assert!(json.contains("lastCheckSuccess"));
        assert!(!json.contains("ABC-123"));

        assert_eq!(TrustRecord::from_json(&json).unwrap(), record);
    }

    #[test]
    fn test_plain_key_json() {
        let record = TrustRecord {
            key: Some(StoredKey::Plain { value: "ABC-123".to_string() }),
            ..TrustRecord::default()
        };
        let json = record.to_json().unwrap();
        assert!(json.contains("\"encoding\": \"plain\""));
        assert!(!record.key.as_ref().unwrap().is_encrypted());
    }

    #[test]
    fn test_empty_record() {
        assert!(TrustRecord::default().is_empty());
        let restored = TrustRecord::from_json("{}").unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_attempt_before_success_rejected() {
        let record = TrustRecord {
            last_check_attempt: Some(now() - Duration::hours(1)),
            last_check_success: Some(now()),
            ..TrustRecord::default()
        };
        assert!(matches!(record.validate(), Err(LicenseError::StoreInvalid(_))));
    }

    #[test]
    fn test_malformed_ciphertext_passes_schema() {
        let json = r#"{"key":{"encoding":"aes256cbc","ciphertext":"001","iv":"0011"}}"#;
        let record = TrustRecord::from_json(json).unwrap();
        assert!(record.key.unwrap().is_encrypted());
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let json = r#"{"key":{"encoding":"rot13","value":"NOP"}}"#;
        assert!(matches!(TrustRecord::from_json(json), Err(LicenseError::StoreInvalid(_))));
    }

    #[test]
    fn test_empty_plain_key_rejected() {
        let json = r#"{"key":{"encoding":"plain","value":"  "}}"#;
        assert!(matches!(TrustRecord::from_json(json), Err(LicenseError::StoreInvalid(_))));
    }
}

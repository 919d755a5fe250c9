//! Licensing service response structs and outcome normalization.

use crate::LicenseError;
use serde::{Deserialize, Serialize};

/// Raw verify response.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    /// Whether the service accepted the key.
    pub success: bool,
    /// Rejection message.
    #[serde(default)]
    pub message: Option<String>,
    /// Activation count.
    #[serde(default)]
    pub uses: Option<u64>,
    /// Sale record behind the key.
    #[serde(default)]
    pub purchase: Option<Purchase>,
}

/// Sale metadata returned with a successful verification.
///
/// Fields the crate does not interpret are kept in `extra` so the cached
/// snapshot matches what the service sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    /// Product the sale belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,

    /// Buyer email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Sale identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<String>,

    /// Sale was refunded.
    #[serde(default)]
    pub refunded: bool,

    /// Sale was charged back.
    #[serde(default)]
    pub chargebacked: bool,

    /// Activation count, when the service embeds it in the purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<u64>,

    /// Remaining fields, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Purchase {
    /// Refunded or charged back purchases never grant entitlement.
    pub fn is_revoked(&self) -> bool {
        self.refunded || self.chargebacked
    }
}

/// Why a key was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The service rejected the key.
    ActivationError {
        /// Message reported by the service.
        message: String,
    },
    /// The purchase is missing, refunded, or charged back.
    LicenseRefunded,
}

impl InvalidReason {
    /// Error equivalent, for operations that fail instead of reporting a status.
    pub fn into_error(self) -> LicenseError {
        match self {
            InvalidReason::ActivationError { message } => LicenseError::ActivationError { message },
            InvalidReason::LicenseRefunded => LicenseError::LicenseRefunded,
        }
    }
}

/// Result of one remote verification. Never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// The key is entitled.
    Valid {
        /// Sale snapshot.
        purchase: Purchase,
        /// Activation count reported by the service.
        use_count: u64,
    },
    /// The service answered and the key is not entitled.
    Invalid {
        /// Classification of the rejection.
        reason: InvalidReason,
    },
    /// No usable answer (network error, timeout, server fault, garbage body).
    Unreachable {
        /// Human-readable cause for logs.
        cause: String,
    },
}

impl VerificationOutcome {
    /// Interpret a parsed response.
    ///
    /// A rejection is reported first. An accepted key whose purchase is
    /// missing, refunded, or charged back is never treated as valid.
    pub fn from_response(response: VerifyResponse) -> Self {
        if !response.success {
            return VerificationOutcome::Invalid {
                reason: InvalidReason::ActivationError {
                    message: response
                        .message
                        .unwrap_or_else(|| "license key rejected".to_string()),
                },
            };
        }

        match response.purchase {
            Some(purchase) if !purchase.is_revoked() => {
                let use_count = response.uses.or(purchase.uses).unwrap_or(0);
                VerificationOutcome::Valid { purchase, use_count }
            }
            _ => VerificationOutcome::Invalid {
                reason: InvalidReason::LicenseRefunded,
            },
        }
    }

    /// Fold into a `Result`, for callers that treat anything but `Valid` as failure.
    pub fn into_result(self) -> Result<(Purchase, u64), LicenseError> {
        match self {
            VerificationOutcome::Valid { purchase, use_count } => Ok((purchase, use_count)),
            VerificationOutcome::Invalid { reason } => Err(reason.into_error()),
            VerificationOutcome::Unreachable { cause } => Err(LicenseError::ServerUnavailable(cause)),
        }
    }
}

/// Parse raw JSON body into a verify response.
pub fn parse_verify_response(body: &[u8]) -> Result<VerifyResponse, LicenseError> {
    serde_json::from_slice(body)
        .map_err(|e| LicenseError::ProtocolError(format!("Failed to parse verify response: {}", e)))
}

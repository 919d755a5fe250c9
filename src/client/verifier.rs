//! Remote Verifier: one verification request, one typed outcome.
//!
//! Transport failures never escape this boundary. Everything that is not
//! an interpretable answer from the service becomes
//! [`VerificationOutcome::Unreachable`].

use crate::client::http::{Transport, TransportResponse};
use crate::crypto::key::key_fingerprint;
use crate::protocol::models::{parse_verify_response, VerificationOutcome};
use tracing::{debug, warn};

/// Verifies license keys for one product against one endpoint.
pub struct RemoteVerifier {
    transport: Box<dyn Transport>,
    api_url: String,
    product_id: String,
}

impl RemoteVerifier {
    /// Create a verifier over the given transport.
    pub fn new(transport: Box<dyn Transport>, api_url: &str, product_id: &str) -> Self {
        Self {
            transport,
            api_url: api_url.to_string(),
            product_id: product_id.to_string(),
        }
    }

    /// Verify `license_key`, optionally counting this as a new activation.
    pub fn verify(&self, license_key: &str, increment_uses_count: bool) -> VerificationOutcome {
        let license_key = license_key.trim();
        let fingerprint = key_fingerprint(license_key);
        let increment = if increment_uses_count { "true" } else { "false" };

        debug!(key = %fingerprint, increment = increment_uses_count, "verifying license");

        let form = [
            ("product_id", self.product_id.as_str()),
            ("license_key", license_key),
            ("increment_uses_count", increment),
        ];

        let outcome = match self.transport.post_form(&self.api_url, &form) {
            Ok(response) => classify(response),
            Err(e) => VerificationOutcome::Unreachable {
                cause: e.to_string(),
            },
        };

        match &outcome {
            VerificationOutcome::Valid { use_count, .. } => {
                debug!(key = %fingerprint, uses = use_count, "license valid")
            }
            VerificationOutcome::Invalid { reason } => {
                debug!(key = %fingerprint, ?reason, "license rejected")
            }
            VerificationOutcome::Unreachable { cause } => {
                warn!(key = %fingerprint, %cause, "licensing server unreachable")
            }
        }

        outcome
    }
}

/// Turn a transport response into an outcome.
///
/// 2xx bodies are interpreted. A non-2xx body that is still a verdict with
/// `success: false` (unknown keys come back as 404) is a rejection. Any
/// other non-2xx response or unparseable body means the server is unusable.
fn classify(response: TransportResponse) -> VerificationOutcome {
    let parsed = parse_verify_response(&response.body);

    if response.is_success() {
        return match parsed {
            Ok(body) => VerificationOutcome::from_response(body),
            Err(e) => VerificationOutcome::Unreachable {
                cause: e.to_string(),
            },
        };
    }

    match parsed {
        Ok(body) if !body.success => VerificationOutcome::from_response(body),
        _ => VerificationOutcome::Unreachable {
            cause: format!("HTTP {}", response.status),
        },
    }
}

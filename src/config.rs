//! Gumlock configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default licensing endpoint.
pub const DEFAULT_API_URL: &str = "https://api.gumroad.com/v2/licenses/verify";

/// Default request timeout (15 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Configuration for a [`LicenseSession`](crate::LicenseSession).
#[derive(Debug, Clone)]
pub struct LicenseConfig {
    /// Product identifier the license keys belong to.
    pub product_id: String,

    /// Licensing endpoint receiving the verification POST.
    pub api_url: String,

    /// Reject activation once the service reports this many uses.
    pub max_uses: Option<u64>,

    /// Offline grace window in days. `None` trusts the cached purchase indefinitely.
    pub max_days_between_checks: Option<u32>,

    /// Store the license key in plain text instead of AES-256-CBC.
    pub disable_encryption: bool,

    /// HTTP transport settings for this session.
    pub transport: TransportConfig,
}

impl LicenseConfig {
    /// Configuration with defaults for everything but the product.
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            api_url: DEFAULT_API_URL.to_string(),
            max_uses: None,
            max_days_between_checks: None,
            disable_encryption: false,
            transport: TransportConfig::default(),
        }
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), crate::LicenseError> {
        if self.product_id.trim().is_empty() {
            return Err(crate::LicenseError::ConfigError(
                "product_id cannot be empty".to_string(),
            ));
        }
        if !(self.api_url.starts_with("https://") || self.api_url.starts_with("http://")) {
            return Err(crate::LicenseError::ConfigError(format!(
                "api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }
        if self.max_uses == Some(0) {
            return Err(crate::LicenseError::ConfigError(
                "max_uses must be at least 1".to_string(),
            ));
        }
        if self.transport.timeout.is_zero() {
            return Err(crate::LicenseError::ConfigError(
                "transport timeout cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-session HTTP settings.
///
/// These apply only to the client built from them. Relaxing certificate
/// validation here never affects other sessions or the rest of the process.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Request timeout. Exceeding it is treated as an unreachable server.
    pub timeout: Duration,

    /// Validate the server's TLS certificate. Set to `false` only for legacy hosts.
    pub reject_unauthorized: bool,

    /// User-Agent product identifier. Defaults to the product id.
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            reject_unauthorized: true,
            user_agent: None,
        }
    }
}

/// Layout of the file-backed trust record.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// File stem (default `license`).
    pub file_name: String,

    /// File extension without the dot (default `json`).
    pub file_extension: String,

    /// Directory holding the record. `None` uses `dirs::data_dir()/<namespace>`.
    pub file_path: Option<PathBuf>,

    /// Delete a record that fails schema validation instead of returning an error.
    pub clear_invalid_config: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            file_name: "license".to_string(),
            file_extension: "json".to_string(),
            file_path: None,
            clear_invalid_config: true,
        }
    }
}

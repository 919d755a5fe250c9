//! Gumlock error types.

use thiserror::Error;

/// Errors that can occur during activation, re-verification, or storage.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No license key provided (empty after trimming).
    #[error("No license key provided")]
    MissingLicense,

    /// The licensing service rejected the key.
    #[error("License activation failed: {message}")]
    ActivationError {
        /// Message reported by the licensing service.
        message: String,
    },

    /// The purchase behind the key was refunded or charged back.
    #[error("License has been refunded or charged back")]
    LicenseRefunded,

    /// The key has already been activated the maximum number of times.
    #[error("License use limit reached ({uses} of {max_uses})")]
    MaxUseExceeded {
        /// Use count reported by the licensing service.
        uses: u64,
        /// Configured use limit.
        max_uses: u64,
    },

    /// The licensing service could not be reached.
    #[error("Licensing server unavailable: {0}")]
    ServerUnavailable(String),

    /// Raw HTTP transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Licensing service response could not be interpreted.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The stored license key could not be decrypted (corrupted local state).
    #[error("Stored license could not be decrypted: {0}")]
    DecryptionError(String),

    /// The license key could not be encrypted for storage.
    #[error("License could not be encrypted: {0}")]
    EncryptionError(String),

    /// The device identifier could not be determined.
    #[error("Device identity unavailable: {0}")]
    DeviceIdentity(String),

    /// Store I/O error.
    #[error("Store I/O error: {0}")]
    StoreIO(String),

    /// Persisted record failed schema validation.
    #[error("Stored record is invalid: {0}")]
    StoreInvalid(String),

    /// Anything else.
    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl LicenseError {
    /// Whether this error is a licensing verdict rather than a local or network fault.
    pub fn is_licensing_verdict(&self) -> bool {
        matches!(
            self,
            LicenseError::ActivationError { .. }
                | LicenseError::LicenseRefunded
                | LicenseError::MaxUseExceeded { .. }
        )
    }
}

//! Device identity used to bind the at-rest encryption key to one machine.

use crate::LicenseError;
use sha2::{Digest, Sha256};

/// Supplies a stable per-device identifier.
pub trait DeviceIdentity: Send + Sync {
    /// Stable identifier for this machine.
    fn device_id(&self) -> Result<String, LicenseError>;
}

impl<F> DeviceIdentity for F
where
    F: Fn() -> String + Send + Sync,
{
    fn device_id(&self) -> Result<String, LicenseError> {
        Ok(self())
    }
}

/// Host-derived identifier: SHA-256 over hostname, OS and architecture.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDeviceIdentity;

impl DeviceIdentity for HostDeviceIdentity {
    fn device_id(&self) -> Result<String, LicenseError> {
        let host = hostname::get()
            .map_err(|e| LicenseError::DeviceIdentity(format!("hostname lookup failed: {}", e)))?;
        let host = host.to_string_lossy();
        if host.is_empty() {
            return Err(LicenseError::DeviceIdentity("empty hostname".to_string()));
        }

        let mut hasher = Sha256::new();
        hasher.update(host.as_bytes());
        hasher.update(b"|");
        hasher.update(std::env::consts::OS.as_bytes());
        hasher.update(b"|");
        hasher.update(std::env::consts::ARCH.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

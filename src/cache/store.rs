//! Key-value store capability holding the trust record.

use crate::cache::format::TrustRecord;
use crate::LicenseError;
use std::sync::Mutex;

/// Persistence for a single [`TrustRecord`].
///
/// No concurrent-writer protection is expected: the last `save` wins.
pub trait Store: Send + Sync {
    /// Load the record, `None` if nothing is stored.
    fn load(&self) -> Result<Option<TrustRecord>, LicenseError>;

    /// Replace the stored record.
    fn save(&self, record: &TrustRecord) -> Result<(), LicenseError>;

    /// Erase the record. Erasing an empty store succeeds.
    fn clear(&self) -> Result<(), LicenseError>;
}

/// In-process store, for tests and hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<TrustRecord>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<TrustRecord>>, LicenseError> {
        self.record
            .lock()
            .map_err(|_| LicenseError::StoreIO("memory store lock poisoned".to_string()))
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<Option<TrustRecord>, LicenseError> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, record: &TrustRecord) -> Result<(), LicenseError> {
        record.validate()?;
        *self.lock()? = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), LicenseError> {
        *self.lock()? = None;
        Ok(())
    }
}

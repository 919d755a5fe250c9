//! Trust Cache: typed accessors over the persisted [`TrustRecord`].
//!
//! The session never edits the record directly. Write ordering is fixed
//! here:
//! - `mark_attempt` before a re-verification
//! - `record_success` only after a valid outcome
//! - `forget_purchase` as soon as a rejection is observed

use crate::cache::format::{StoredKey, TrustRecord};
use crate::cache::store::Store;
use crate::protocol::models::Purchase;
use crate::LicenseError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Owner of the trust record lifecycle.
#[derive(Clone)]
pub struct TrustCache {
    store: Arc<dyn Store>,
}

impl TrustCache {
    /// Wrap an injected store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current record, empty if nothing is stored.
    pub fn record(&self) -> Result<TrustRecord, LicenseError> {
        Ok(self.store.load()?.unwrap_or_default())
    }

    /// Stored license key, if any.
    pub fn key(&self) -> Result<Option<StoredKey>, LicenseError> {
        Ok(self.record()?.key)
    }

    /// Cached purchase snapshot, if any.
    pub fn purchase(&self) -> Result<Option<Purchase>, LicenseError> {
        Ok(self.record()?.purchase)
    }

    /// Replace the whole record after a successful activation.
    pub fn activate(
        &self,
        key: StoredKey,
        purchase: Purchase,
        at: DateTime<Utc>,
    ) -> Result<(), LicenseError> {
        self.store.save(&TrustRecord {
            key: Some(key),
            last_check_attempt: Some(at),
            last_check_success: Some(at),
            purchase: Some(purchase),
        })
    }

    /// Record that a verification is about to be attempted.
    ///
    /// If the clock has moved behind the last success, the attempt is
    /// clamped to that success so the record stays valid.
    pub fn mark_attempt(&self, at: DateTime<Utc>) -> Result<(), LicenseError> {
        let mut record = self.record()?;
        let at = record.last_check_success.map_or(at, |success| success.max(at));
        record.last_check_attempt = Some(at);
        self.store.save(&record)
    }

    /// Record a valid verification, overwriting the purchase snapshot.
    pub fn record_success(&self, purchase: Purchase, at: DateTime<Utc>) -> Result<(), LicenseError> {
        let mut record = self.record()?;
        if record.last_check_attempt.map_or(true, |attempt| attempt < at) {
            record.last_check_attempt = Some(at);
        }
        record.last_check_success = Some(at);
        record.purchase = Some(purchase);
        self.store.save(&record)
    }

    /// Drop the cached purchase after a rejection.
    pub fn forget_purchase(&self) -> Result<(), LicenseError> {
        let mut record = self.record()?;
        if record.purchase.take().is_some() {
            self.store.save(&record)?;
        }
        Ok(())
    }

    /// Erase everything.
    pub fn clear(&self) -> Result<(), LicenseError> {
        self.store.clear()
    }
}

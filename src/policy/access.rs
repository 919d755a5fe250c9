//! Use-limit and offline-grace enforcement.
//!
//! This module decides:
//! - whether a key has run out of activations (`max_uses`)
//! - whether stale cached trust may still be honored while offline
//!   (`max_days_between_checks`)

use crate::clock::Clock;
use crate::LicenseError;
use chrono::{DateTime, Duration, Utc};

/// Activation limit configured by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseLimit {
    /// Maximum number of activations (None = unlimited).
    pub max_uses: Option<u64>,
}

impl UseLimit {
    /// Wrap an optional limit.
    pub fn new(max_uses: Option<u64>) -> Self {
        Self { max_uses }
    }

    /// Whether a limit is configured (and the non-incrementing pre-check is needed).
    pub fn has_limit(&self) -> bool {
        self.max_uses.is_some()
    }

    /// Check that another activation is allowed given the service's use count.
    ///
    /// # Returns
    /// * `Ok(())` - No limit, or `use_count < max_uses`
    /// * `Err(MaxUseExceeded)` - `use_count` already meets or exceeds the limit
    pub fn check(&self, use_count: u64) -> Result<(), LicenseError> {
        match self.max_uses {
            Some(max_uses) if use_count >= max_uses => Err(LicenseError::MaxUseExceeded {
                uses: use_count,
                max_uses,
            }),
            _ => Ok(()),
        }
    }
}

/// Verdict on cached trust while the server is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceDecision {
    /// Cached trust may be used.
    WithinGrace,
    /// Too long since the last successful check; the app must go online.
    Expired,
}

/// Offline grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfflineGrace {
    /// Allowed days between successful checks (None = unbounded).
    pub max_days_between_checks: Option<u32>,
}

impl OfflineGrace {
    /// Wrap an optional window.
    pub fn new(max_days_between_checks: Option<u32>) -> Self {
        Self {
            max_days_between_checks,
        }
    }

    /// Evaluate the window against the last successful check.
    ///
    /// With a window configured, a missing success timestamp, one older
    /// than the window, or one in the future (clock rolled back) expires.
    /// Exactly at the boundary is still within grace.
    pub fn evaluate(
        &self,
        last_check_success: Option<DateTime<Utc>>,
        clock: &dyn Clock,
    ) -> GraceDecision {
        let Some(days) = self.max_days_between_checks else {
            return GraceDecision::WithinGrace;
        };
        let Some(last) = last_check_success else {
            return GraceDecision::Expired;
        };

        let elapsed = clock.elapsed_since(last);
        if elapsed < Duration::zero() || elapsed > Duration::days(i64::from(days)) {
            GraceDecision::Expired
        } else {
            GraceDecision::WithinGrace
        }
    }
}

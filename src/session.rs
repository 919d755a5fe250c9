//! License Session - the main public API for Gumlock.
//!
//! The `LicenseSession` ties the pieces together:
//! - `activate` verifies a new key (counting a use) and persists it
//! - `recheck` re-verifies the stored key, falling back to cached trust
//!   within the offline grace window
//! - `clear` forgets everything
//!
//! One session per process and store. Concurrent `activate`/`recheck`
//! calls against the same store are not serialized here.

use crate::cache::format::StoredKey;
use crate::cache::store::Store;
use crate::cache::trust::TrustCache;
use crate::client::http::{HttpTransport, Transport};
use crate::client::verifier::RemoteVerifier;
use crate::clock::{Clock, SystemClock};
use crate::config::LicenseConfig;
use crate::crypto::cipher::{decrypt, encrypt, EncryptedKey};
use crate::crypto::key::{derive_key, key_fingerprint, DerivedKey};
use crate::device::{DeviceIdentity, HostDeviceIdentity};
use crate::policy::access::{GraceDecision, OfflineGrace, UseLimit};
use crate::protocol::models::{InvalidReason, Purchase, VerificationOutcome};
use crate::LicenseError;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// License state as seen by the application.
#[derive(Debug, Clone, PartialEq)]
pub enum LicenseStatus {
    /// No license key on record.
    NotSet,
    /// Entitled.
    Valid {
        /// Purchase snapshot.
        purchase: Purchase,
        /// Whether this came from the cache because the server was unreachable.
        from_cache: bool,
    },
    /// Not entitled.
    Invalid {
        /// Why the service refused the key. `None` when offline with no
        /// verified purchase on record.
        reason: Option<InvalidReason>,
    },
    /// Offline for longer than the grace window; a successful online check is required.
    Outdated,
}

impl LicenseStatus {
    /// Whether the application should unlock licensed features.
    pub fn is_valid(&self) -> bool {
        matches!(self, LicenseStatus::Valid { .. })
    }
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    /// Purchase snapshot.
    pub purchase: Purchase,

    /// Use count reported after this activation was counted.
    pub use_count: u64,
}

/// Injected collaborators for [`LicenseSession::with_collaborators`].
pub struct Collaborators {
    /// Persistence for the trust record.
    pub store: Arc<dyn Store>,

    /// Fetch capability for the licensing endpoint.
    pub transport: Box<dyn Transport>,

    /// Device identifier for key derivation.
    pub device: Arc<dyn DeviceIdentity>,

    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// License session for one product.
///
/// This is the primary public API. Create one instance per application
/// and reuse it for all license checks.
pub struct LicenseSession {
    config: LicenseConfig,
    clock: Arc<dyn Clock>,
    verifier: RemoteVerifier,
    cache: TrustCache,
    device: Arc<dyn DeviceIdentity>,
    key: OnceCell<DerivedKey>,
}

impl LicenseSession {
    /// Create a session with the reqwest transport, host device identity,
    /// and system clock.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - HTTP client creation fails
    pub fn new(config: LicenseConfig, store: Arc<dyn Store>) -> Result<Self, LicenseError> {
        config.validate()?;
        let transport = HttpTransport::new(&config.product_id, &config.transport)?;
        Self::with_collaborators(
            config,
            Collaborators {
                store,
                transport: Box::new(transport),
                device: Arc::new(HostDeviceIdentity),
                clock: Arc::new(SystemClock),
            },
        )
    }

    /// Create a session from explicitly supplied collaborators.
    pub fn with_collaborators(
        config: LicenseConfig,
        collaborators: Collaborators,
    ) -> Result<Self, LicenseError> {
        config.validate()?;
        let verifier = RemoteVerifier::new(
            collaborators.transport,
            &config.api_url,
            &config.product_id,
        );

        Ok(Self {
            config,
            clock: collaborators.clock,
            verifier,
            cache: TrustCache::new(collaborators.store),
            device: collaborators.device,
            key: OnceCell::new(),
        })
    }

    /// Activate a license key.
    ///
    /// With `max_uses` configured, a non-incrementing check runs first so an
    /// exhausted key does not consume another activation. The two calls are
    /// not atomic: two devices activating at once may both pass the check.
    ///
    /// Nothing is persisted unless the incrementing verification is valid.
    ///
    /// # Errors
    /// - `MissingLicense` - Empty key
    /// - `MaxUseExceeded` - Use count already at `max_uses`
    /// - `ActivationError` - Service rejected the key
    /// - `LicenseRefunded` - Purchase refunded or charged back
    /// - `ServerUnavailable` - Service unreachable
    pub fn activate(&self, license_key: &str) -> Result<Activation, LicenseError> {
        let license_key = license_key.trim();
        if license_key.is_empty() {
            return Err(LicenseError::MissingLicense);
        }
        let fingerprint = key_fingerprint(license_key);

        let limit = UseLimit::new(self.config.max_uses);
        if limit.has_limit() {
            let (_, uses) = self.verifier.verify(license_key, false).into_result()?;
            if let Err(e) = limit.check(uses) {
                warn!(key = %fingerprint, uses, "activation refused, use limit reached");
                return Err(e);
            }
        }

        let (purchase, use_count) = self.verifier.verify(license_key, true).into_result()?;

        let stored = self.seal(license_key)?;
        self.cache
            .activate(stored, purchase.clone(), self.clock.now_utc())?;

        info!(key = %fingerprint, uses = use_count, "license activated");
        Ok(Activation { purchase, use_count })
    }

    /// Re-verify the stored key without counting a use.
    ///
    /// # Errors
    /// - `DecryptionError` - The stored key cannot be decrypted on this device
    /// - `StoreIO` / `StoreInvalid` - The record cannot be read or written
    pub fn recheck(&self) -> Result<LicenseStatus, LicenseError> {
        let Some(stored) = self.cache.key()? else {
            debug!("recheck with no license on record");
            return Ok(LicenseStatus::NotSet);
        };
        let license_key = self.unseal(&stored)?;

        let now = self.clock.now_utc();
        self.cache.mark_attempt(now)?;

        match self.verifier.verify(&license_key, false) {
            VerificationOutcome::Valid { purchase, .. } => {
                self.cache.record_success(purchase.clone(), now)?;
                Ok(LicenseStatus::Valid {
                    purchase,
                    from_cache: false,
                })
            }
            VerificationOutcome::Invalid { reason } => {
                info!(key = %key_fingerprint(&license_key), ?reason, "license no longer valid");
                self.cache.forget_purchase()?;
                Ok(LicenseStatus::Invalid {
                    reason: Some(reason),
                })
            }
            VerificationOutcome::Unreachable { .. } => self.status_offline(),
        }
    }

    /// Apply the offline grace policy to the cached record, without a network call.
    pub fn status_offline(&self) -> Result<LicenseStatus, LicenseError> {
        let record = self.cache.record()?;
        if record.key.is_none() {
            return Ok(LicenseStatus::NotSet);
        }

        let grace = OfflineGrace::new(self.config.max_days_between_checks);
        match grace.evaluate(record.last_check_success, self.clock.as_ref()) {
            GraceDecision::Expired => {
                warn!(
                    last_success = ?record.last_check_success,
                    "offline grace period exceeded"
                );
                Ok(LicenseStatus::Outdated)
            }
            GraceDecision::WithinGrace => match record.purchase {
                Some(purchase) => {
                    debug!("using cached license while offline");
                    Ok(LicenseStatus::Valid {
                        purchase,
                        from_cache: true,
                    })
                }
                None => Ok(LicenseStatus::Invalid { reason: None }),
            },
        }
    }

    /// The stored license key, decrypted.
    pub fn license_key(&self) -> Result<Option<String>, LicenseError> {
        self.cache
            .key()?
            .map(|stored| self.unseal(&stored))
            .transpose()
    }

    /// The cached purchase snapshot.
    pub fn cached_purchase(&self) -> Result<Option<Purchase>, LicenseError> {
        self.cache.purchase()
    }

    /// Erase all persisted state. Safe to call repeatedly.
    pub fn clear(&self) -> Result<(), LicenseError> {
        self.cache.clear()?;
        info!("license cleared");
        Ok(())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    fn derived_key(&self) -> Result<&DerivedKey, LicenseError> {
        self.key.get_or_try_init(|| {
            let device_id = self.device.device_id()?;
            Ok(derive_key(&self.config.product_id, &device_id))
        })
    }

    fn seal(&self, license_key: &str) -> Result<StoredKey, LicenseError> {
        if self.config.disable_encryption {
            return Ok(StoredKey::Plain {
                value: license_key.to_string(),
            });
        }
        let encrypted = encrypt(license_key, self.derived_key()?)?;
        Ok(StoredKey::encrypted(&encrypted))
    }

    fn unseal(&self, stored: &StoredKey) -> Result<String, LicenseError> {
        match stored {
            StoredKey::Plain { value } => Ok(value.clone()),
            StoredKey::Aes256cbc { ciphertext, iv } => {
                let encrypted = EncryptedKey::from_hex(ciphertext, iv)?;
                decrypt(&encrypted, self.derived_key()?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::format::TrustRecord;
    use crate::cache::store::MemoryStore;
    use crate::client::http::TransportResponse;
    use crate::clock::MockClock;
    use chrono::Duration;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const VALID: &str = r#"{"success":true,"uses":1,"purchase":{"sale_id":"s1","refunded":false}}"#;
    const REFUNDED: &str = r#"{"success":true,"purchase":{"sale_id":"s1","refunded":true}}"#;
    const REJECTED: &str = r#"{"success":false,"message":"That license does not exist."}"#;

    #[derive(Default)]
    struct Script {
        replies: VecDeque<Result<(u16, String), String>>,
        increments: Vec<String>,
    }

    #[derive(Clone, Default)]
    struct ScriptedTransport(Arc<Mutex<Script>>);

    impl ScriptedTransport {
        fn reply(&self, status: u16, body: &str) -> &Self {
            self.0.lock().unwrap().replies.push_back(Ok((status, body.to_string())));
            self
        }

        fn fail(&self) -> &Self {
            self.0.lock().unwrap().replies.push_back(Err("connection refused".to_string()));
            self
        }

        fn increments(&self) -> Vec<String> {
            self.0.lock().unwrap().increments.clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn post_form(&self, _url: &str, form: &[(&str, &str)]) -> Result<TransportResponse, LicenseError> {
            let mut script = self.0.lock().unwrap();
            let increment = form
                .iter()
                .find(|(k, _)| *k == "increment_uses_count")
                .map(|(_, v)| v.to_string())
                .unwrap_or_default();
            script.increments.push(increment);
            match script.replies.pop_front().expect("unexpected request") {
                Ok((status, body)) => Ok(TransportResponse {
                    status,
                    body: body.into_bytes(),
                }),
                Err(cause) => Err(LicenseError::Transport(cause)),
            }
        }
    }

    struct Harness {
        session: LicenseSession,
        transport: ScriptedTransport,
        store: Arc<MemoryStore>,
        clock: Arc<MockClock>,
    }

    fn harness(config: LicenseConfig) -> Harness {
        let transport = ScriptedTransport::default();
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(MockClock::from_rfc3339("2025-01-15T12:00:00Z"));
        let session = LicenseSession::with_collaborators(
            config,
            Collaborators {
                store: store.clone(),
                transport: Box::new(transport.clone()),
                device: Arc::new(|| "device-1".to_string()),
                clock: clock.clone(),
            },
        )
        .unwrap();
        Harness {
            session,
            transport,
            store,
            clock,
        }
    }

    #[test]
    fn test_activate_persists_encrypted_key() {
        let h = harness(LicenseConfig::new("prod"));
        h.transport.reply(200, VALID);

        let activation = h.session.activate(" ABC-123 ").unwrap();
        assert_eq!(activation.use_count, 1);
        assert_eq!(h.transport.increments(), vec!["true"]);

        let record = h.store.load().unwrap().unwrap();
        assert!(record.key.as_ref().unwrap().is_encrypted());
        assert!(!record.to_json().unwrap().contains("ABC-123"));
        assert_eq!(h.session.license_key().unwrap().as_deref(), Some("ABC-123"));
    }

    #[test]
    fn test_activate_plain_when_encryption_disabled() {
        let mut config = LicenseConfig::new("prod");
        config.disable_encryption = true;
        let h = harness(config);
        h.transport.reply(200, VALID);

        h.session.activate("ABC-123").unwrap();
        let record = h.store.load().unwrap().unwrap();
        assert_eq!(record.key, Some(StoredKey::Plain { value: "ABC-123".to_string() }));
    }

    #[test]
    fn test_activate_empty_key() {
        let h = harness(LicenseConfig::new("prod"));
        assert!(matches!(h.session.activate("   "), Err(LicenseError::MissingLicense)));
        assert!(h.transport.increments().is_empty());
    }

    #[test]
    fn test_activate_rejected_persists_nothing() {
        let h = harness(LicenseConfig::new("prod"));
        h.transport.reply(404, REJECTED);

        let err = h.session.activate("ABC-123").unwrap_err();
        assert!(matches!(err, LicenseError::ActivationError { ref message } if message == "That license does not exist."));
        assert!(h.store.load().unwrap().is_none());
    }

    #[test]
    fn test_activate_unreachable() {
        let h = harness(LicenseConfig::new("prod"));
        h.transport.fail();
        assert!(matches!(
            h.session.activate("ABC-123"),
            Err(LicenseError::ServerUnavailable(_))
        ));
        assert!(h.store.load().unwrap().is_none());
    }

    #[test]
    fn test_activate_max_uses_precheck() {
        let mut config = LicenseConfig::new("prod");
        config.max_uses = Some(3);
        let h = harness(config);
        h.transport
            .reply(200, r#"{"success":true,"uses":3,"purchase":{}}"#);

        assert!(matches!(
            h.session.activate("ABC-123"),
            Err(LicenseError::MaxUseExceeded { uses: 3, max_uses: 3 })
        ));
        assert_eq!(h.transport.increments(), vec!["false"]);
        assert!(h.store.load().unwrap().is_none());
    }

    #[test]
    fn test_activate_max_uses_allows_below_limit() {
        let mut config = LicenseConfig::new("prod");
        config.max_uses = Some(3);
        let h = harness(config);
        h.transport
            .reply(200, r#"{"success":true,"uses":2,"purchase":{}}"#)
            .reply(200, r#"{"success":true,"uses":3,"purchase":{}}"#);

        let activation = h.session.activate("ABC-123").unwrap();
        assert_eq!(activation.use_count, 3);
        assert_eq!(h.transport.increments(), vec!["false", "true"]);
    }

    #[test]
    fn test_recheck_not_set() {
        let h = harness(LicenseConfig::new("prod"));
        assert_eq!(h.session.recheck().unwrap(), LicenseStatus::NotSet);
        assert!(h.transport.increments().is_empty());
    }

    #[test]
    fn test_recheck_valid_updates_success() {
        let h = harness(LicenseConfig::new("prod"));
        h.transport.reply(200, VALID).reply(200, VALID);
        h.session.activate("ABC-123").unwrap();

        h.clock.advance(Duration::days(2));
        let status = h.session.recheck().unwrap();
        assert!(matches!(status, LicenseStatus::Valid { from_cache: false, .. }));
        assert_eq!(h.transport.increments(), vec!["true", "false"]);

        let record = h.store.load().unwrap().unwrap();
        assert_eq!(record.last_check_success, Some(h.clock.now_utc()));
        assert_eq!(record.last_check_attempt, Some(h.clock.now_utc()));
    }

    #[test]
    fn test_recheck_refunded_erases_purchase() {
        let h = harness(LicenseConfig::new("prod"));
        h.transport.reply(200, VALID).reply(200, REFUNDED);
        h.session.activate("ABC-123").unwrap();

        assert_eq!(
            h.session.recheck().unwrap(),
            LicenseStatus::Invalid {
                reason: Some(InvalidReason::LicenseRefunded)
            }
        );
        assert!(h.session.cached_purchase().unwrap().is_none());
        assert!(h.session.license_key().unwrap().is_some());
    }

    #[test]
    fn test_recheck_offline_within_grace() {
        let mut config = LicenseConfig::new("prod");
        config.max_days_between_checks = Some(7);
        let h = harness(config);
        h.transport.reply(200, VALID).fail();
        h.session.activate("ABC-123").unwrap();

        h.clock.advance(Duration::days(6));
        let status = h.session.recheck().unwrap();
        assert!(matches!(status, LicenseStatus::Valid { from_cache: true, .. }));

        let record = h.store.load().unwrap().unwrap();
        assert_eq!(record.last_check_attempt, Some(h.clock.now_utc()));
        assert!(record.last_check_success < record.last_check_attempt);
    }

    #[test]
    fn test_recheck_offline_outdated() {
        let mut config = LicenseConfig::new("prod");
        config.max_days_between_checks = Some(7);
        let h = harness(config);
        h.transport.reply(200, VALID).fail();
        h.session.activate("ABC-123").unwrap();

        h.clock.advance(Duration::days(8));
        assert_eq!(h.session.recheck().unwrap(), LicenseStatus::Outdated);
    }

    #[test]
    fn test_recheck_offline_without_purchase_is_invalid() {
        let h = harness(LicenseConfig::new("prod"));
        h.transport.reply(200, VALID).reply(200, REFUNDED).fail();
        h.session.activate("ABC-123").unwrap();
        h.session.recheck().unwrap();

        assert_eq!(
            h.session.recheck().unwrap(),
            LicenseStatus::Invalid { reason: None }
        );
    }

    #[test]
    fn test_recheck_after_clock_moved_back() {
        let h = harness(LicenseConfig::new("prod"));
        h.transport.reply(200, VALID).reply(200, VALID);
        h.session.activate("ABC-123").unwrap();
        let activated_at = h.clock.now_utc();

        h.clock.advance(Duration::minutes(-5));
        let status = h.session.recheck().unwrap();
        assert!(matches!(status, LicenseStatus::Valid { from_cache: false, .. }));

        let record = h.store.load().unwrap().unwrap();
        record.validate().unwrap();
        assert_eq!(record.last_check_success, Some(h.clock.now_utc()));
        assert_eq!(record.last_check_attempt, Some(activated_at));
    }

    #[test]
    fn test_recheck_corrupted_key_is_decryption_error() {
        let h = harness(LicenseConfig::new("prod"));
        let bogus = encrypt("ABC-123", &derive_key("prod", "other-device")).unwrap();
        h.store
            .save(&TrustRecord {
                key: Some(StoredKey::encrypted(&bogus)),
                ..TrustRecord::default()
            })
            .unwrap();

        assert!(matches!(h.session.recheck(), Err(LicenseError::DecryptionError(_))));
        assert!(h.transport.increments().is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let h = harness(LicenseConfig::new("prod"));
        h.transport.reply(200, VALID);
        h.session.activate("ABC-123").unwrap();

        h.session.clear().unwrap();
        assert_eq!(h.session.recheck().unwrap(), LicenseStatus::NotSet);
        h.session.clear().unwrap();
        assert_eq!(h.session.recheck().unwrap(), LicenseStatus::NotSet);
        assert_eq!(h.session.status_offline().unwrap(), LicenseStatus::NotSet);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let transport = ScriptedTransport::default();
        let result = LicenseSession::with_collaborators(
            LicenseConfig::new(""),
            Collaborators {
                store: Arc::new(MemoryStore::new()),
                transport: Box::new(transport),
                device: Arc::new(|| "device-1".to_string()),
                clock: Arc::new(SystemClock),
            },
        );
        assert!(matches!(result, Err(LicenseError::ConfigError(_))));
    }
}

//! # Gumlock
//!
//! **Client-side license activation for desktop applications.**
//!
//! Gumlock verifies a user's license key against a Gumroad-style
//! `licenses/verify` endpoint, remembers the outcome locally, and lets the
//! application keep working offline for a bounded grace period.
//!
//! ## Features
//!
//! - **Typed outcomes**: every verification is `Valid`, `Invalid`, or `Unreachable`
//! - **Refund-aware**: refunded or charged-back purchases are never entitled
//! - **Offline grace**: cached trust honored for `max_days_between_checks`
//! - **Encrypted at rest**: the key is stored AES-256-CBC encrypted under a device-bound key
//! - **Use limits**: activation refused once `max_uses` is reached, without spending a use
//!
//! ## Quickstart
//!
//! ```no_run
//! use gumlock::{FileStore, LicenseConfig, LicenseSession, LicenseStatus, StoreOptions};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), gumlock::LicenseError> {
//!     let mut config = LicenseConfig::new("your-product-id");
//!     config.max_days_between_checks = Some(14);
//!
//!     let store = FileStore::new("myapp", &StoreOptions::default())?;
//!     let session = LicenseSession::new(config, Arc::new(store))?;
//!
//!     match session.recheck()? {
//!         LicenseStatus::Valid { from_cache, .. } => println!("Licensed (cached: {})", from_cache),
//!         LicenseStatus::NotSet => {
//!             session.activate("LICENSE-KEY-HERE")?;
//!         }
//!         LicenseStatus::Outdated => println!("Please connect to the internet"),
//!         LicenseStatus::Invalid { reason } => println!("Not licensed: {:?}", reason),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Threat Model
//!
//! Gumlock keeps honest users honest. It does **not** prevent binary
//! patching, debugging, or editing the local record. Encryption only keeps
//! the license key from being copied between machines in readable form.
//!
//! ## Concurrency
//!
//! One session per process and store. The store has no writer locking;
//! the last write wins.

#![deny(unsafe_code)]
#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod device;
pub mod errors;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Cache layer
pub mod cache;

// Policy layer
pub mod policy;

// Session (main public API)
pub mod session;

// Re-exports for public API
pub use cache::file::FileStore;
pub use cache::format::{StoredKey, TrustRecord};
pub use cache::store::{MemoryStore, Store};
pub use client::http::{HttpTransport, Transport, TransportResponse};
pub use clock::{Clock, SystemClock};
pub use config::{LicenseConfig, StoreOptions, TransportConfig};
pub use device::{DeviceIdentity, HostDeviceIdentity};
pub use errors::LicenseError;
pub use protocol::models::{InvalidReason, Purchase, VerificationOutcome};
pub use session::{Activation, Collaborators, LicenseSession, LicenseStatus};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;

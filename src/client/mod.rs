//! Remote verification.

pub mod http;
pub mod verifier;

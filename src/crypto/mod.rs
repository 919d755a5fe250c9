//! At-rest protection of the license key.

pub mod cipher;
pub mod key;

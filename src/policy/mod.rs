//! Use-limit and offline-grace policy.

pub mod access;

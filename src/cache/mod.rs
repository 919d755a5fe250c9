//! Local trust state.

pub mod file;
pub mod format;
pub mod store;
pub mod trust;

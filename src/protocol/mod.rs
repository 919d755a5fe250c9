//! Licensing service wire format.

pub mod models;

//! tunegrab library crate.
//!
//! Exposes the HTTP surface and configuration for integration testing.

pub mod api;
pub mod config;
pub mod logging;

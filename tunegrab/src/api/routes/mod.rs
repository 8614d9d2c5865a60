//! API route handlers.

pub mod download;
pub mod extract;

//! Core types shared by every DiaStat crate.

pub mod error;

pub use error::{Error, Result};

/// Crate version, stamped into reports and the server health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

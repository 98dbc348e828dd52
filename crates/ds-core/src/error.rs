//! Error types for DiaStat

use thiserror::Error;

/// DiaStat error type.
///
/// The taxonomy is deliberately closed: every failure in the pipeline or the
/// service maps onto one of these kinds, carrying the triggering context in
/// its message. Errors propagate to the nearest boundary (CLI driver or HTTP
/// handler); nothing is retried or swallowed.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration or schema error: malformed/missing keys, inconsistent
    /// artifact contracts. Aborts the run; no partial output is valid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error: malformed CSV, unmapped target values, categories unseen
    /// at fit time, non-finite numerics.
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Computation error: singular solves, degenerate inputs.
    #[error("Computation error: {0}")]
    Computation(String),

    /// Domain error: caller-correctable conditions (duplicate email, bad
    /// credentials). Mapped to 4xx at the HTTP boundary with a specific,
    /// non-leaking message.
    #[error("{0}")]
    Domain(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

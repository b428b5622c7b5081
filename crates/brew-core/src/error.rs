#![forbid(unsafe_code)]

//! Error types for startup-time loading.
//!
//! Nothing on the engine's event path returns these: missing targets and
//! re-entrant requests are outcomes, not errors. Only building a profile
//! table or loading configuration can fail.

use thiserror::Error;

/// Profile table construction or loading failure.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("item id must not be empty")]
    EmptyId,

    /// The id names a built-in panel.
    #[error("item id is reserved: {0}")]
    ReservedId(String),

    #[error("duplicate item id: {0}")]
    DuplicateId(String),

    #[error("sales share for {id} out of range: {share}")]
    ShareOutOfRange { id: String, share: f64 },

    #[cfg(feature = "config")]
    #[error("TOML error: {0}")]
    Toml(toml::de::Error),

    #[cfg(feature = "config")]
    #[error("JSON error: {0}")]
    Json(serde_json::Error),
}

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "config")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "config")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

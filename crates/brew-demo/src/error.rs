use std::path::PathBuf;

use brew_core::{ConfigError, ProfileError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DemoError>;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("profile table error: {0}")]
    Profiles(#[from] ProfileError),

    #[error("unsupported file extension for {path} (expected .toml or .json)")]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("logging already initialised: {message}")]
    Logging { message: String },
}

impl DemoError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Profiles(_) | Self::UnsupportedFormat { .. } => 3,
            Self::InvalidArgument { .. } => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

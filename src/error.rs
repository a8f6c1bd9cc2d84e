// src/error.rs

//! Unified error handling for the intelligence engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Everything that can go wrong below the engine facade.
#[derive(Error, Debug)]
pub enum AppError {
    /// Local state or profile files could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure inside the reqwest site client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A stored JSON document is malformed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine config or a site profile is not valid TOML
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Config error: {0}")]
    Config(String),

    /// A loaded value is out of range
    #[error("Invalid value: {0}")]
    Validation(String),

    /// The injected site client failed to return a page
    #[error("Fetch error for {site}: {message}")]
    Fetch { site: String, message: String },

    /// A repository could not read or write its records
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Failure reported by a site's HTTP client.
    pub fn fetch(site: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            site: site.into(),
            message: message.to_string(),
        }
    }

    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }
}

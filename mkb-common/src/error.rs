//! Common error types for the Media Kit Builder

use thiserror::Error;

/// Common result type for Media Kit Builder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the builder crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config file could not be parsed
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Component data failed its per-type schema
    #[error("Invalid {component_type} component: {reason}")]
    InvalidComponent {
        /// Registry type name of the offending component
        component_type: String,
        /// Human-readable validation failure
        reason: String,
    },

    /// Persisted or incoming state could not be interpreted
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Shorthand for building an `InvalidComponent` error
    pub fn invalid_component(component_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidComponent {
            component_type: component_type.into(),
            reason: reason.into(),
        }
    }
}

//! Error types for configuration handling.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating an environment configuration.
///
/// Every variant is fatal: synthesis aborts before any resource is declared.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid deployment mode: '{0}' (expected 'dev' or 'prod')")]
    InvalidMode(String),

    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),

    #[error("Address space exhausted: {cidr} holds {available} subnets of /{mask}, {required} required")]
    AddressSpaceExhausted {
        cidr: String,
        mask: u8,
        required: u64,
        available: u64,
    },

    #[error("CIDR {cidr} overlaps reserved range {reserved}")]
    CidrOverlap { cidr: String, reserved: String },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Configuration document is not a mapping: {0}")]
    NotAMapping(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

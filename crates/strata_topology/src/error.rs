//! Error types for topology assembly.

use thiserror::Error;

use strata_config::ConfigError;

use crate::resource::{Layer, ResourceId};

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors that can occur while assembling a topology.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resource declared twice: {0}")]
    DuplicateResource(ResourceId),

    #[error("Output declared twice: {0}")]
    DuplicateOutput(String),

    #[error("{from} references undeclared resource {to}")]
    DanglingReference { from: String, to: ResourceId },

    #[error("{from} ({from_layer} layer) may not reference {to} ({to_layer} layer)")]
    LayerViolation {
        from: String,
        from_layer: Layer,
        to: ResourceId,
        to_layer: Layer,
    },

    #[error("Invalid security boundary: {0}")]
    InvalidSecurityRule(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Invalid name '{name}': {message}")]
    InvalidName { name: String, message: String },

    #[error("Topology validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

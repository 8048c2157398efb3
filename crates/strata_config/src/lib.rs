//! # strata_config
//!
//! Environment configuration for the strata topology assembler.
//!
//! A deployment is described by two YAML documents: a mode-independent
//! `base.yml` and a mode-specific overlay (`dev.yml` or `prod.yml`). The
//! overlay is deep-merged over the base and the result is deserialized into a
//! typed [`EnvironmentConfig`], which is validated before any resource is
//! declared.
//!
//! ## Example
//!
//! ```rust,no_run
//! use strata_config::{ConfigLoader, DeploymentMode};
//!
//! let mode = DeploymentMode::from_env().unwrap();
//! let config = ConfigLoader::new("env").load(mode).unwrap();
//! config.validate(mode).unwrap();
//! ```

pub mod cidr;
pub mod error;
pub mod loader;
pub mod merge;
pub mod mode;
pub mod model;
mod validate;

pub use cidr::Ipv4Cidr;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use merge::deep_merge;
pub use mode::{DeploymentMode, MODE_ENV_VAR};
pub use model::{
    BastionConfig, CacheConfig, ComputeConfig, DataConfig, EdgeConfig, EnvironmentConfig,
    MessagingConfig, NetworkConfig, PipelineConfig, QueueConfig, RegistryConfig,
    SecretsConfig, SharedVolumeConfig, SourceConfig, StorageConfig, AccessPointConfig,
    WebServiceConfig, WorkerServiceConfig, DeadLetterQueueConfig,
};

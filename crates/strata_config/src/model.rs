//! Typed environment configuration tree.
//!
//! Field names follow the YAML documents (`camelCase`). Sizing knobs that have
//! a sensible default are optional; identities and application-level names are
//! required.

use serde::{Deserialize, Serialize};

use crate::cidr::Ipv4Cidr;
use crate::error::ConfigResult;

/// Root of the merged configuration, keyed by layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    /// Project prefix used by the naming policy.
    pub project: String,
    pub region: String,
    #[serde(default)]
    pub account: Option<String>,
    pub network: NetworkConfig,
    pub secrets: SecretsConfig,
    pub data: DataConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    pub edge: EdgeConfig,
    pub compute: ComputeConfig,
    pub messaging: MessagingConfig,
    pub pipeline: PipelineConfig,
}

impl EnvironmentConfig {
    /// Deserialize a merged YAML tree.
    pub fn from_value(value: serde_yaml::Value) -> ConfigResult<Self> {
        Ok(serde_yaml::from_value(value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub cidr: String,
    #[serde(default = "default_subnet_cidr_mask")]
    pub subnet_cidr_mask: u8,
    /// Port the application tier listens on behind the load balancer.
    #[serde(default = "default_app_port")]
    pub app_port: u16,
    /// Address ranges already in use in the account (peered networks, VPNs).
    #[serde(default)]
    pub reserved_cidrs: Vec<String>,
}

impl NetworkConfig {
    pub fn vpc_cidr(&self) -> ConfigResult<Ipv4Cidr> {
        Ipv4Cidr::new(&self.cidr)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsConfig {
    pub db_username: String,
    pub service_user_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConfig {
    pub db_name: String,
    #[serde(default)]
    pub backup_retention: u32,
    #[serde(default)]
    pub backup_preferred_window: Option<String>,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    pub bastion: BastionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BastionConfig {
    pub key_name: String,
    #[serde(default)]
    pub host_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub access_point: AccessPointConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPointConfig {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_cache_engine_version")]
    pub engine_version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            engine_version: default_cache_engine_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    #[serde(default = "default_max_image_age_days")]
    pub max_image_age_days: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_image_age_days: default_max_image_age_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeConfig {
    pub health_check_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeConfig {
    pub web: WebServiceConfig,
    pub worker: WorkerServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebServiceConfig {
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
    #[serde(default = "default_cpu")]
    pub cpu: u32,
    #[serde(default = "default_memory_mib")]
    pub memory_mib: u32,
    pub app_container_name: String,
    pub proxy_container_name: String,
    #[serde(default = "default_port_mapping_name")]
    pub port_mapping_name: String,
    pub shared_volume: SharedVolumeConfig,
    /// Where the durable filesystem is mounted in the app container, if at all.
    #[serde(default)]
    pub persistent_mount_path: Option<String>,
}

/// Ephemeral volume shared by the proxy and app containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedVolumeConfig {
    #[serde(default = "default_shared_volume_name")]
    pub name: String,
    pub app_path: String,
    pub proxy_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerServiceConfig {
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
    #[serde(default = "default_cpu")]
    pub cpu: u32,
    #[serde(default = "default_memory_mib")]
    pub memory_mib: u32,
    pub container_name: String,
    pub entry_point: Vec<String>,
    #[serde(default)]
    pub command: Vec<String>,
    pub working_dir: String,
    pub shared_assets_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagingConfig {
    #[serde(default)]
    pub main_queue: QueueConfig,
    #[serde(default)]
    pub dead_letter_queue: DeadLetterQueueConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    #[serde(default = "default_retention_period_days")]
    pub retention_period_days: u32,
    #[serde(default = "default_visibility_timeout_hours")]
    pub visibility_timeout_hours: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retention_period_days: default_retention_period_days(),
            visibility_timeout_hours: default_visibility_timeout_hours(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterQueueConfig {
    #[serde(flatten)]
    pub queue: QueueConfig,
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,
}

impl Default for DeadLetterQueueConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            max_receive_count: default_max_receive_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub source: SourceConfig,
    #[serde(default = "default_build_spec")]
    pub build_spec: String,
}

/// Coordinates of the connected source repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub connection_arn: String,
    pub owner: String,
    pub repository: String,
    /// Overrides the mode's default branch.
    #[serde(default)]
    pub branch: Option<String>,
}

fn default_subnet_cidr_mask() -> u8 {
    20
}

fn default_app_port() -> u16 {
    80
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_cache_engine_version() -> String {
    "1.6.17".to_string()
}

fn default_max_image_age_days() -> u32 {
    30
}

fn default_desired_count() -> u32 {
    1
}

fn default_cpu() -> u32 {
    256
}

fn default_memory_mib() -> u32 {
    512
}

fn default_port_mapping_name() -> String {
    "web".to_string()
}

fn default_shared_volume_name() -> String {
    "app-socket".to_string()
}

fn default_retention_period_days() -> u32 {
    4
}

fn default_visibility_timeout_hours() -> u32 {
    1
}

fn default_max_receive_count() -> u32 {
    3
}

fn default_build_spec() -> String {
    "buildspec.yml".to_string()
}

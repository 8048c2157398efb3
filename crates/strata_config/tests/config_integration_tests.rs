//! Integration tests for configuration loading and validation.

use std::fs;

use strata_config::{ConfigError, ConfigLoader, DeploymentMode, EnvironmentConfig};
use tempfile::tempdir;

const BASE: &str = include_str!("../../../env/base.yml");
const DEV: &str = include_str!("../../../env/dev.yml");
const PROD: &str = include_str!("../../../env/prod.yml");

fn load(mode: DeploymentMode) -> EnvironmentConfig {
    let overlay = match mode {
        DeploymentMode::Dev => DEV,
        DeploymentMode::Prod => PROD,
    };
    ConfigLoader::from_documents(BASE, overlay).unwrap()
}

fn with_base_override(overlay: &str) -> Result<EnvironmentConfig, ConfigError> {
    ConfigLoader::from_documents(BASE, overlay)
}

#[test]
fn test_sample_configs_validate() {
    for mode in DeploymentMode::all() {
        let config = load(mode);
        config.validate(mode).unwrap();
    }
}

#[test]
fn test_prod_overlay_wins() {
    let config = load(DeploymentMode::Prod);
    assert_eq!(config.data.backup_retention, 7);
    assert_eq!(config.data.backup_preferred_window.as_deref(), Some("03:00-04:00"));
    assert_eq!(config.compute.web.desired_count, 2);
    // Untouched base keys survive the merge.
    assert_eq!(config.data.db_name, "shop");
    assert_eq!(config.pipeline.source.branch.as_deref(), Some("main"));
}

#[test]
fn test_defaults_are_applied() {
    let config = load(DeploymentMode::Dev);
    assert_eq!(config.compute.web.cpu, 256);
    assert_eq!(config.compute.web.memory_mib, 512);
    assert_eq!(config.cache.engine_version, "1.6.17");
    assert!(config.network.reserved_cidrs.is_empty());
}

#[test]
fn test_missing_key_is_reported() {
    let without_edge = BASE.replace("edge:\n  healthCheckPath: /health/\n", "");
    let err = ConfigLoader::from_documents(&without_edge, "").unwrap_err();
    assert!(matches!(err, ConfigError::Yaml(_)));
    assert!(err.to_string().contains("edge"));
}

#[test]
fn test_invalid_cidr_is_rejected() {
    let config = with_base_override("network:\n  cidr: 10.0.0.0/33\n").unwrap();
    let err = config.validate(DeploymentMode::Dev).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidCidr(_)));
}

#[test]
fn test_exhausted_address_space_is_rejected() {
    let config = with_base_override("network:\n  cidr: 10.0.0.0/22\n  subnetCidrMask: 24\n").unwrap();
    let err = config.validate(DeploymentMode::Dev).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::AddressSpaceExhausted { required: 6, available: 4, .. }
    ));
}

#[test]
fn test_reserved_overlap_is_rejected() {
    let config = with_base_override("network:\n  reservedCidrs: [10.0.128.0/24]\n").unwrap();
    let err = config.validate(DeploymentMode::Dev).unwrap_err();
    assert!(matches!(err, ConfigError::CidrOverlap { .. }));
}

#[test]
fn test_prod_requires_backups() {
    let config = load(DeploymentMode::Dev);
    // The dev tree has no window and zero retention, which prod refuses.
    let err = config.validate(DeploymentMode::Prod).unwrap_err();
    assert!(err.to_string().contains("data.backupRetention"));
}

#[test]
fn test_invalid_queue_retention_is_rejected() {
    let config = with_base_override("messaging:\n  mainQueue:\n    retentionPeriodDays: 30\n").unwrap();
    let err = config.validate(DeploymentMode::Dev).unwrap_err();
    assert!(err.to_string().contains("retentionPeriodDays"));
}

#[test]
fn test_loader_reads_env_directory() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("base.yml"), BASE).unwrap();
    fs::write(dir.path().join("prod.yml"), PROD).unwrap();

    let config = ConfigLoader::new(dir.path()).load(DeploymentMode::Prod).unwrap();
    assert_eq!(config.data.backup_retention, 7);

    // No dev overlay on disk: the base alone is used.
    let config = ConfigLoader::new(dir.path()).load(DeploymentMode::Dev).unwrap();
    assert_eq!(config.data.backup_retention, 0);
}

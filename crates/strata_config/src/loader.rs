//! Loading of the base and mode-specific configuration documents.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::mode::DeploymentMode;
use crate::model::EnvironmentConfig;

/// Name of the mode-independent document.
pub const BASE_FILE: &str = "base.yml";

/// Reads `base.yml` and the mode overlay from an environment directory.
pub struct ConfigLoader {
    env_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(env_dir: impl Into<PathBuf>) -> Self {
        Self {
            env_dir: env_dir.into(),
        }
    }

    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    /// Load and merge the documents for `mode`.
    ///
    /// The base document is required. A missing overlay is tolerated and the
    /// base is used as-is.
    pub fn load(&self, mode: DeploymentMode) -> ConfigResult<EnvironmentConfig> {
        let merged = self.load_value(mode)?;
        EnvironmentConfig::from_value(merged)
    }

    /// Load and merge the documents without deserializing them.
    pub fn load_value(&self, mode: DeploymentMode) -> ConfigResult<Value> {
        let base_path = self.env_dir.join(BASE_FILE);
        if !base_path.exists() {
            return Err(ConfigError::NotFound(base_path));
        }
        info!("Loading {} configuration from {:?}", mode, self.env_dir);

        let base = read_document(&base_path)?;

        let overlay_path = self.env_dir.join(mode.overlay_file());
        let overlay = if overlay_path.exists() {
            debug!("Applying overlay {:?}", overlay_path);
            read_document(&overlay_path)?
        } else {
            warn!("No overlay at {:?}, using base configuration only", overlay_path);
            Value::Null
        };

        Ok(merge_documents(base, overlay))
    }

    /// Merge two in-memory documents and deserialize the result.
    pub fn from_documents(base: &str, overlay: &str) -> ConfigResult<EnvironmentConfig> {
        let base = parse_document("base", base)?;
        let overlay = parse_document("overlay", overlay)?;
        EnvironmentConfig::from_value(merge_documents(base, overlay))
    }
}

/// An empty overlay document leaves the base untouched; anything else is
/// deep merged over it.
fn merge_documents(base: Value, overlay: Value) -> Value {
    if overlay.is_null() {
        base
    } else {
        deep_merge(base, overlay)
    }
}

fn read_document(path: &Path) -> ConfigResult<Value> {
    let content = fs::read_to_string(path)?;
    parse_document(&path.display().to_string(), &content)
}

fn parse_document(label: &str, content: &str) -> ConfigResult<Value> {
    let value: Value = serde_yaml::from_str(content)?;
    match value {
        Value::Mapping(_) | Value::Null => Ok(value),
        _ => Err(ConfigError::NotAMapping(label.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_base_is_an_error() {
        let dir = tempdir().unwrap();
        let err = ConfigLoader::new(dir.path()).load_value(DeploymentMode::Dev).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_overlay_is_optional() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(BASE_FILE), "project: demo\n").unwrap();

        let value = ConfigLoader::new(dir.path()).load_value(DeploymentMode::Prod).unwrap();
        assert_eq!(value["project"], Value::String("demo".to_string()));
    }

    #[test]
    fn test_overlay_for_mode_is_applied() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(BASE_FILE), "data:\n  backupRetention: 0\n").unwrap();
        fs::write(dir.path().join("prod.yml"), "data:\n  backupRetention: 7\n").unwrap();
        fs::write(dir.path().join("dev.yml"), "data:\n  backupRetention: 1\n").unwrap();

        let loader = ConfigLoader::new(dir.path());
        let prod = loader.load_value(DeploymentMode::Prod).unwrap();
        let dev = loader.load_value(DeploymentMode::Dev).unwrap();
        assert_eq!(prod["data"]["backupRetention"], Value::Number(7.into()));
        assert_eq!(dev["data"]["backupRetention"], Value::Number(1.into()));
    }

    #[test]
    fn test_empty_overlay_file_keeps_base() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(BASE_FILE), "data:\n  backupRetention: 3\n").unwrap();
        fs::write(dir.path().join("dev.yml"), "# nothing to override\n").unwrap();

        let value = ConfigLoader::new(dir.path()).load_value(DeploymentMode::Dev).unwrap();
        assert_eq!(value["data"]["backupRetention"], Value::Number(3.into()));
    }

    #[test]
    fn test_overlay_null_clears_base_value() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(BASE_FILE), "pipeline:\n  source:\n    branch: main\n").unwrap();
        fs::write(dir.path().join("dev.yml"), "pipeline:\n  source:\n    branch: ~\n").unwrap();

        let value = ConfigLoader::new(dir.path()).load_value(DeploymentMode::Dev).unwrap();
        assert_eq!(value["pipeline"]["source"]["branch"], Value::Null);
    }

    #[test]
    fn test_scalar_document_is_rejected() {
        let err = ConfigLoader::from_documents("just a string", "").unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping(_)));
    }
}

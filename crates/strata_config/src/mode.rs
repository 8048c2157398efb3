//! Deployment mode selector.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Environment variable consulted by [`DeploymentMode::from_env`].
pub const MODE_ENV_VAR: &str = "MODE";

/// Deployment environment the topology is synthesized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Dev,
    Prod,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Dev => "dev",
            DeploymentMode::Prod => "prod",
        }
    }

    /// Parse a mode flag. Empty input selects the default mode.
    pub fn parse(s: &str) -> ConfigResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "dev" => Ok(DeploymentMode::Dev),
            "prod" => Ok(DeploymentMode::Prod),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }

    /// Read the mode from the `MODE` environment variable, defaulting to dev.
    pub fn from_env() -> ConfigResult<Self> {
        match std::env::var(MODE_ENV_VAR) {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn all() -> [Self; 2] {
        [DeploymentMode::Dev, DeploymentMode::Prod]
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, DeploymentMode::Prod)
    }

    /// File name of the overlay document for this mode.
    pub fn overlay_file(&self) -> &'static str {
        match self {
            DeploymentMode::Dev => "dev.yml",
            DeploymentMode::Prod => "prod.yml",
        }
    }
}

impl std::str::FromStr for DeploymentMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(DeploymentMode::parse("dev").unwrap(), DeploymentMode::Dev);
        assert_eq!(DeploymentMode::parse("PROD").unwrap(), DeploymentMode::Prod);
        assert_eq!(DeploymentMode::parse("").unwrap(), DeploymentMode::Dev);
    }

    #[test]
    fn test_parse_invalid_mode() {
        let err = DeploymentMode::parse("staging").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMode(m) if m == "staging"));
    }

    #[test]
    fn test_overlay_file() {
        assert_eq!(DeploymentMode::Dev.overlay_file(), "dev.yml");
        assert_eq!(DeploymentMode::Prod.overlay_file(), "prod.yml");
    }
}

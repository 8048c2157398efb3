//! CLI command definitions.
//!
//! Every subcommand loads the merged environment configuration for one
//! deployment mode and assembles the topology before doing its own work.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;

use strata_config::{ConfigLoader, DeploymentMode, EnvironmentConfig, MODE_ENV_VAR};
use strata_topology::{SynthesizedTopology, TopologyAssembler};

pub mod graph;
pub mod outputs;
pub mod synth;
pub mod validate;

/// strata - layered cloud topology assembler
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about = "strata - layered cloud topology assembler")]
#[command(long_about = r#"
strata assembles a layered cloud topology (network, secrets, data, storage,
cache, registry, edge, compute, messaging, pipeline) from YAML environment
configuration and emits it as a deployable template.

COMMANDS:
  synth     → Assemble the topology and write the template
  validate  → Assemble the topology and report validation checks
  outputs   → Show the stack outputs
  graph     → Show the layer order and security boundaries

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Configuration error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble the topology and emit the template
    Synth(synth::SynthArgs),

    /// Assemble the topology and report validation checks
    Validate(validate::ValidateArgs),

    /// Show stack outputs
    Outputs(outputs::OutputsArgs),

    /// Show layer dependencies and security boundaries
    Graph(graph::GraphArgs),
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments shared by every command.
#[derive(Args, Debug, Clone)]
pub struct EnvArgs {
    /// Directory holding base.yml and the mode overlays
    #[arg(long, default_value = "env")]
    pub env_dir: PathBuf,

    /// Deployment mode (dev or prod); defaults to dev
    #[arg(short, long, env = MODE_ENV_VAR)]
    pub mode: Option<String>,
}

impl EnvArgs {
    pub fn mode(&self) -> Result<DeploymentMode> {
        Ok(DeploymentMode::parse(self.mode.as_deref().unwrap_or_default())?)
    }

    pub fn load(&self) -> Result<(DeploymentMode, EnvironmentConfig)> {
        let mode = self.mode()?;
        debug!("Loading {} configuration from {}", mode, self.env_dir.display());
        let config = ConfigLoader::new(&self.env_dir)
            .load(mode)
            .with_context(|| format!("failed to load configuration from {}", self.env_dir.display()))?;
        Ok((mode, config))
    }

    /// Loads the configuration and assembles the topology.
    pub fn assemble(&self) -> Result<(EnvironmentConfig, SynthesizedTopology)> {
        let (mode, config) = self.load()?;
        let synthesized = TopologyAssembler::new(&config, mode).assemble()?;
        Ok((config, synthesized))
    }

    /// Like [`assemble`](Self::assemble), but keeps a failing report.
    pub fn synthesize(&self) -> Result<(EnvironmentConfig, SynthesizedTopology)> {
        let (mode, config) = self.load()?;
        let synthesized = TopologyAssembler::new(&config, mode).synthesize()?;
        Ok((config, synthesized))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    const FILES: [(&str, &str); 3] = [
        ("base.yml", include_str!("../../../../env/base.yml")),
        ("dev.yml", include_str!("../../../../env/dev.yml")),
        ("prod.yml", include_str!("../../../../env/prod.yml")),
    ];

    /// Copies the shipped environment files into `dir`.
    pub fn write_env(dir: &Path) {
        for (name, content) in FILES {
            std::fs::write(dir.join(name), content).unwrap();
        }
    }

    pub fn env_args(dir: &Path, mode: &str) -> super::EnvArgs {
        super::EnvArgs {
            env_dir: dir.to_path_buf(),
            mode: Some(mode.to_string()),
        }
    }
}

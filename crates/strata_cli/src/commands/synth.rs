//! Synth command - Assemble the topology and emit the template.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use strata_topology::Template;

use super::EnvArgs;

#[derive(Args)]
pub struct SynthArgs {
    #[command(flatten)]
    env: EnvArgs,

    /// Write the template to this file instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

pub async fn execute(args: SynthArgs) -> Result<()> {
    let (config, synthesized) = args.env.assemble()?;
    let json = Template::new(&synthesized.topology, &config.project).to_json()?;

    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            tokio::fs::write(path, format!("{json}\n"))
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(
                "Wrote {} resources for {} mode to {}",
                synthesized.topology.len(),
                synthesized.mode(),
                path.display()
            );
        }
        None => println!("{json}"),
    }

    Ok(())
}

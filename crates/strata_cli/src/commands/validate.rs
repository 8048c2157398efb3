//! Validate command - Assemble the topology and report validation checks.

use anyhow::Result;
use clap::Args;

use strata_topology::TopologyError;

use super::{EnvArgs, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    env: EnvArgs,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let (config, synthesized) = args.env.synthesize()?;
    let report = &synthesized.report;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            println!(
                "Validating {} topology for {}",
                synthesized.mode(),
                config.project
            );
            for check in &report.checks {
                let mark = if check.passed { "✅" } else { "❌" };
                println!("   {} {}: {}", mark, check.name, check.message);
            }
            println!();
            println!(
                "{} resources, {} outputs",
                synthesized.topology.len(),
                synthesized.topology.outputs().len()
            );
        }
    }

    if !report.passed {
        return Err(TopologyError::ValidationFailed(report.failures().join("; ")).into());
    }
    Ok(())
}

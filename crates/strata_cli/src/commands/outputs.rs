//! Outputs command - Show stack outputs.

use std::collections::BTreeMap;

use anyhow::Result;
use clap::Args;

use super::{EnvArgs, OutputFormat};

#[derive(Args)]
pub struct OutputsArgs {
    #[command(flatten)]
    env: EnvArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

pub async fn execute(args: OutputsArgs) -> Result<()> {
    let (_, synthesized) = args.env.assemble()?;
    let pairs = synthesized.output_pairs();

    match args.format {
        OutputFormat::Json => {
            let map: BTreeMap<_, _> = pairs.into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        OutputFormat::Text => {
            let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
            for (key, value) in pairs {
                println!("{key:width$}  {value}");
            }
        }
    }
    Ok(())
}

//! Graph command - Show layer dependencies and security boundaries.

use anyhow::Result;
use clap::Args;

use strata_topology::Layer;

use super::EnvArgs;

#[derive(Args)]
pub struct GraphArgs {
    #[command(flatten)]
    env: EnvArgs,
}

pub async fn execute(args: GraphArgs) -> Result<()> {
    let (_, synthesized) = args.env.assemble()?;
    let topology = &synthesized.topology;

    println!("Layers ({} mode):", synthesized.mode());
    for layer in Layer::build_order() {
        let deps: Vec<&str> = layer.dependencies().iter().map(Layer::as_str).collect();
        let count = topology.layer_nodes(layer).count();
        if deps.is_empty() {
            println!("  {:<10} {:>3} resources", layer.as_str(), count);
        } else {
            println!(
                "  {:<10} {:>3} resources  <- {}",
                layer.as_str(),
                count,
                deps.join(", ")
            );
        }
    }

    println!();
    println!("Security boundaries:");
    for rule in synthesized.outputs.network.boundary.rules() {
        println!(
            "  {:<10} -> {:<10} tcp/{:<5} {}",
            rule.source.to_string(),
            rule.target.as_str(),
            rule.port,
            rule.description
        );
    }

    println!();
    println!("Pipeline:");
    let stages: Vec<&str> = synthesized
        .outputs
        .pipeline
        .plan
        .stages()
        .iter()
        .map(|s| s.kind.as_str())
        .collect();
    println!("  {}", stages.join(" -> "));

    Ok(())
}

//! `foldpack graph` command implementation.
//!
//! Walks the workspace without writing anything and lists every package
//! with its classification and target names.

use super::{fail, load_pack_config, runtime};
use crate::Overrides;
use foldpack_core::{inspect, Config, NodeSummary};
use miette::Result;

/// Run the graph command.
pub fn run(config: &Config, overrides: &Overrides, json: bool) -> Result<()> {
    let pack_config = load_pack_config(config, overrides).map_err(|e| fail(&e, json))?;

    let rt = runtime()?;
    let nodes = rt
        .block_on(inspect(&config.cwd, &pack_config))
        .map_err(|e| fail(&e, json))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "packages": nodes
            })
        );
        return Ok(());
    }

    print_table(&nodes);
    Ok(())
}

fn print_table(nodes: &[NodeSummary]) {
    let libraries: Vec<_> = nodes.iter().filter(|n| !n.external).collect();
    let externals: Vec<_> = nodes.iter().filter(|n| n.external).collect();

    println!("Libraries ({}):", libraries.len());
    for node in &libraries {
        println!(
            "  {} {} -> ./{} ({}/)",
            node.name,
            node.version.as_deref().unwrap_or(&node.range),
            node.export_name.as_deref().unwrap_or("?"),
            node.folder_name.as_deref().unwrap_or("?"),
        );
        if !node.dependencies.is_empty() {
            println!("    deps: {}", node.dependencies.join(", "));
        }
    }

    println!();
    println!("External ({}):", externals.len());
    for node in &externals {
        let parent = node.parent.as_deref().unwrap_or("-");
        println!("  {} {} (via {parent})", node.name, node.range);
    }
}

//! `foldpack assemble` command implementation.

use super::{fail, load_pack_config, runtime};
use crate::Overrides;
use foldpack_core::{assemble, AssembleOptions, AssembleReport, Config};
use miette::{IntoDiagnostic, Result};

/// Parsed arguments of `foldpack assemble`.
#[derive(Debug, Clone)]
pub struct AssembleAction {
    pub overrides: Overrides,
    pub dry_run: bool,
    pub pack: bool,
}

/// Run the assemble command.
pub fn run(config: &Config, action: AssembleAction, json: bool) -> Result<()> {
    let pack_config = load_pack_config(config, &action.overrides).map_err(|e| fail(&e, json))?;
    let opts = AssembleOptions {
        dry_run: action.dry_run,
        pack: action.pack,
    };

    let rt = runtime()?;
    let report = rt
        .block_on(assemble(&config.cwd, &pack_config, &opts))
        .map_err(|e| fail(&e, json))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "report": report
            })
        );
        return Ok(());
    }

    print_report(&report)
}

fn print_report(report: &AssembleReport) -> Result<()> {
    if report.dry_run {
        let manifest = serde_json::to_string_pretty(&report.manifest).into_diagnostic()?;
        println!("{manifest}");
        println!();
        println!(
            "dry run: {}@{} from {} package(s), nothing written",
            report.name, report.version, report.packages
        );
        return Ok(());
    }

    println!("{}@{}", report.name, report.version);
    println!("  output: {}", report.output.display());
    println!("  packages walked: {}", report.packages);

    println!("  libraries ({}):", report.copied.len());
    for copy in &report.copied {
        let global = if copy.global_types { " +global types" } else { "" };
        println!(
            "    {} -> {}/ ({} files{})",
            copy.package, copy.folder, copy.files, global
        );
    }

    if report.dependencies.is_empty() {
        println!("  dependencies: none");
    } else {
        println!("  dependencies ({}):", report.dependencies.len());
        for (name, range) in &report.dependencies {
            println!("    {name} {range}");
        }
    }

    if let Some(rewrite) = &report.rewrite {
        println!(
            "  rewritten: {} of {} file(s)",
            rewrite.changed, rewrite.scanned
        );
    }

    match &report.pack {
        Some(pack) => match (&pack.archive, &pack.digest) {
            (Some(archive), Some(digest)) => {
                println!("  archive: {} (blake3 {digest})", archive.display());
            }
            _ => println!("  archive: packed (no archive name reported)"),
        },
        None => println!("  archive: skipped"),
    }

    Ok(())
}

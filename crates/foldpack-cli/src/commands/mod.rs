pub mod assemble;
pub mod graph;
pub mod version;

use crate::Overrides;
use foldpack_core::{Config, Error, PackConfig};
use miette::{IntoDiagnostic, Result};

/// Read `foldpack.json` and apply command-line overrides.
fn load_pack_config(config: &Config, overrides: &Overrides) -> foldpack_core::Result<PackConfig> {
    let mut pack_config = PackConfig::load(&config.cwd)?;
    if let Some(scope) = &overrides.scope {
        pack_config = pack_config.with_scope(scope.clone());
    }
    if let Some(canonical) = &overrides.canonical {
        pack_config = pack_config.with_canonical(canonical.clone());
    }
    if let Some(output) = &overrides.output {
        pack_config = pack_config.with_output(output.clone());
    }
    Ok(pack_config)
}

/// Runtime for one command. Scheduling is cooperative; blocking work goes
/// through `spawn_blocking` and rayon.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

/// Report a pipeline failure. With `--json` the error object is printed to
/// stdout and the process exits 1.
fn fail(err: &Error, json: bool) -> miette::Report {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": false,
                "error": {
                    "code": err.code(),
                    "message": err.to_string()
                }
            })
        );
        std::process::exit(1);
    }
    miette::miette!("{} ({})", err, err.code())
}

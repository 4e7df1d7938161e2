#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

mod commands;
mod logging;

use clap::Parser;
use foldpack_core::Config;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "foldpack")]
#[command(author, version, about = "Fold a monorepo's built packages into one umbrella package", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory (the workspace root)
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Values that override `foldpack.json`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Internal scope prefix (e.g. "@scope/")
    #[arg(long)]
    scope: Option<String>,

    /// Package providing the umbrella version and the root export
    #[arg(long)]
    canonical: Option<String>,

    /// Output folder, relative to the workspace root
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Assemble the umbrella package into the output folder
    Assemble {
        #[command(flatten)]
        overrides: Overrides,

        /// Compose and print the manifest without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the packaging command
        #[arg(long)]
        no_pack: bool,
    },

    /// Show the dependency graph as the walker sees it
    Graph {
        #[command(flatten)]
        overrides: Overrides,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let cwd = dunce::canonicalize(&cwd).unwrap_or(cwd);

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Assemble {
            overrides,
            dry_run,
            no_pack,
        }) => {
            let span = tracing::info_span!("assemble", cmd = "assemble", cwd = %config.cwd.display());
            let _guard = span.enter();
            let action = commands::assemble::AssembleAction {
                overrides,
                dry_run,
                pack: !no_pack,
            };
            commands::assemble::run(&config, action, cli.json)
        }
        Some(Commands::Graph { overrides }) => {
            let span = tracing::info_span!("graph", cmd = "graph", cwd = %config.cwd.display());
            let _guard = span.enter();
            commands::graph::run(&config, &overrides, cli.json)
        }
    }
}

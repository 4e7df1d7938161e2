//! Logging initialization for the CLI.
//!
//! The library crates only emit `tracing` events; the subscriber lives here.

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
///
/// # Arguments
/// * `verbosity` - 0 = INFO, 1 = DEBUG, 2+ = TRACE
/// * `json` - If true, write JSON lines to stderr so stdout stays a single JSON object
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG is honoured; the verbosity flag raises our own crates
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    for krate in ["foldpack_core", "foldpack_cli"] {
        if let Ok(directive) = format!("{krate}={level}").parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

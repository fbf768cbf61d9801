//! Logging setup.
//!
//! Logs go to stderr so stdout carries only the stage reports and the
//! dashboard JSON. `RUST_LOG` wins unless `--verbose` was given.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";
const VERBOSE_FILTER: &str = "debug,reqwest=warn,hyper=warn,rustls=warn";

fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(VERBOSE_FILTER);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber; a second call is a no-op.
pub fn init(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter(verbose))
        .try_init()
        .ok();
}

//! Logging setup
//!
//! Library code only emits `tracing` events; binaries install a subscriber
//! with one of these functions. Output goes to stderr so listings printed on
//! stdout stay clean.

use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "burrow=info,warn";
const VERBOSE_FILTER: &str = "burrow=debug,info";

/// Install a fmt subscriber honouring `RUST_LOG`, defaulting to info for this crate
pub fn init_tracing() {
    install(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()), false);
}

/// Like [`init_tracing`] but defaulting to debug output with source locations
pub fn init_tracing_verbose() {
    install(EnvFilter::try_from_default_env().unwrap_or_else(|_| VERBOSE_FILTER.into()), true);
}

fn install(filter: EnvFilter, verbose: bool) {
    // a second install (tests, embedding hosts) keeps the first subscriber
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .try_init();
}

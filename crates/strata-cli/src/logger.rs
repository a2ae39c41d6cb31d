//! Logging setup for the strata CLI.
//!
//! Log lines go to stderr so stdout stays free for the manifest that
//! development builds print.
//!
//! Level selection, first match wins:
//! 1. `--verbose`: debug for every strata crate
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. info for the CLI, warnings from the libraries

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str =
    "strata_cli=debug,strata_bundler=debug,strata_config=debug,strata_graph=debug";
const QUIET_FILTER: &str = "error";
const DEFAULT_FILTER: &str =
    "strata_cli=info,strata_bundler=warn,strata_config=warn,strata_graph=warn";

/// Filter for the given flags.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let no_color = no_color || !crate::ui::should_use_color();
    init_logger_with_filter(filter_for(verbose, quiet), no_color);
}

/// Install the global subscriber with a custom filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .without_time()
        .compact();

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

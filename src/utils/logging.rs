// Tracing subscriber setup for the CLI

use tracing_subscriber::EnvFilter;

/// Variable holding an `EnvFilter` directive, e.g. `BOOTSTRAP_LOG=debug`
pub const LOG_ENV: &str = "BOOTSTRAP_LOG";

/// Default filter directive when `BOOTSTRAP_LOG` is unset
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// reserved for command output; a second call is a no-op.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();
}

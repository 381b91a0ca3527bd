//! Tracing subscriber setup. Diagnostics go to stderr; the operator report
//! stays on stdout.

use std::io::IsTerminal;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

static LOG_ENV_VAR: &str = "LOADER_LOG";
const DEFAULT_FILTER: &str = "loader=info,sqlx=warn";

/// Initializes the global subscriber once.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .init();
    });
}

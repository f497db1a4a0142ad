#![forbid(unsafe_code)]

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PMCRMS_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Logs go to stderr; stdout carries the protocol.
pub(crate) fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_env(LOG_ENV).ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .try_init();
}

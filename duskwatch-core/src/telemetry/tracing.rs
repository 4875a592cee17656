//! Process-start logging setup: a single global `tracing` subscriber
//! configured once from an environment-driven filter directive.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber. `filter` is an explicit
/// env-filter directive (from configuration); when `None`, falls back to
/// `RUST_LOG`, and then to `info` if that is unset too.
pub fn init_logging(filter: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = match filter {
        Some(directive) => EnvFilter::try_new(directive)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt().with_env_filter(env_filter).try_init()?;
    Ok(())
}

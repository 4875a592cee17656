use serde::Deserialize;

/// Structured logging configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// The `tracing` env-filter directive string. When unset, falls back
    /// to `RUST_LOG`, and then to `info` if that is unset too.
    #[serde(default)]
    pub filter: Option<String>,
}

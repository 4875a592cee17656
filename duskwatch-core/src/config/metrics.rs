use serde::Deserialize;

/// Process-health metrics endpoint.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    /// `host:port` to serve the Prometheus text exposition format on.
    /// Unset disables the endpoint entirely.
    #[serde(default)]
    pub listen_addr: Option<String>,
}

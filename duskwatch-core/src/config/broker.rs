use serde::Deserialize;

/// Probing daemon connections the broker maintains.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BrokerConfig {
    /// `host:port` pairs for probing daemon connections. An empty list
    /// means no broker connections are established.
    #[serde(default)]
    pub daemons: Vec<String>,
}

use serde::Deserialize;

/// Number of shard workers to spin up.
#[derive(Debug, Deserialize, Clone)]
pub struct ShardsConfig {
    /// Default: 4
    #[serde(default = "default_count")]
    pub count: usize,
}

impl Default for ShardsConfig {
    fn default() -> Self {
        ShardsConfig { count: default_count() }
    }
}

fn default_count() -> usize {
    4
}

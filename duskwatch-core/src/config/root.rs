use serde::Deserialize;

use super::broker::BrokerConfig;
use super::cache::CacheConfig;
use super::collectors::CollectorsConfig;
use super::logging::LoggingConfig;
use super::metrics::MetricsConfig;
use super::network::NetworkConfig;
use super::raw_probe::RawProbeConfig;
use super::shards::ShardsConfig;

/// Top-level configuration structure, deserialized from a single TOML file.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The darknet address range and filter toggle.
    #[serde(flatten)]
    pub network: NetworkConfig,
    /// Output directory for the rotated CSVs.
    pub collectors: CollectorsConfig,
    /// Spoofing belief store and probing defaults.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Shard worker count.
    #[serde(default)]
    pub shards: ShardsConfig,
    /// Probing daemon connections.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Raw UDP transmitter.
    #[serde(default)]
    pub raw_probe: RawProbeConfig,
    /// Structured logging.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Process-health metrics endpoint.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

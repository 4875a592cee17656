pub mod broker;
pub mod cache;
pub mod collectors;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod raw_probe;
pub mod root;
pub mod shards;
mod validator;

pub use broker::BrokerConfig;
pub use cache::{CacheConfig, ProbeCounts};
pub use collectors::CollectorsConfig;
pub use loader::load_from_path;
pub use logging::LoggingConfig;
pub use metrics::MetricsConfig;
pub use network::NetworkConfig;
pub use raw_probe::RawProbeConfig;
pub use root::Config;
pub use shards::ShardsConfig;

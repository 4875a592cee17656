use super::root::Config;
use crate::net::ipv4::Subnet;
use std::path::Path;

/// Checks cross-field consistency and reports every problem it can find,
/// rather than stopping at the first.
pub fn validate(config: &Config) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    if config.network.network.parse::<Subnet>().is_err() {
        problems.push(format!("invalid network CIDR: {}", config.network.network));
    }

    if config.shards.count == 0 {
        problems.push("shards.count must be nonzero".to_string());
    }

    let out_dir = Path::new(&config.collectors.out_dir);
    if !out_dir.exists() && fs_create_dir_would_fail(out_dir) {
        problems.push(format!(
            "collectors.out-dir does not exist and could not be created: {}",
            config.collectors.out_dir
        ));
    }

    for daemon in &config.broker.daemons {
        if daemon.rsplit_once(':').is_none() {
            problems.push(format!("broker daemon address missing port: {daemon}"));
        }
    }

    let (low, high) = config.cache.ephemeral_port_range;
    if low > high {
        problems.push(format!(
            "cache.ephemeral_port_range is inverted: {low}..{high}"
        ));
    }

    if let Some(addr) = &config.metrics.listen_addr {
        if addr.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!("invalid metrics.listen_addr: {addr}"));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

/// Best-effort check of whether a missing output directory could plausibly
/// be created later: its parent must exist. Doesn't actually create
/// anything — validation must not have side effects.
fn fs_create_dir_would_fail(out_dir: &Path) -> bool {
    match out_dir.parent() {
        Some(parent) if parent.as_os_str().is_empty() => false,
        Some(parent) => !parent.exists(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::broker::BrokerConfig;
    use crate::config::cache::CacheConfig;
    use crate::config::collectors::CollectorsConfig;
    use crate::config::logging::LoggingConfig;
    use crate::config::metrics::MetricsConfig;
    use crate::config::network::NetworkConfig;
    use crate::config::raw_probe::RawProbeConfig;
    use crate::config::shards::ShardsConfig;

    fn base_config() -> Config {
        Config {
            network: NetworkConfig {
                network: "10.0.0.0/16".to_string(),
                enable_filters: false,
            },
            collectors: CollectorsConfig {
                out_dir: ".".to_string(),
            },
            cache: CacheConfig::default(),
            shards: ShardsConfig::default(),
            broker: BrokerConfig::default(),
            raw_probe: RawProbeConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn reports_every_problem_at_once() {
        let mut config = base_config();
        config.network.network = "not-a-cidr".to_string();
        config.shards.count = 0;
        config.broker.daemons = vec!["no-port-here".to_string()];

        let problems = validate(&config).unwrap_err();
        assert_eq!(problems.len(), 3, "{problems:?}");
    }

    #[test]
    fn inverted_ephemeral_range_is_rejected() {
        let mut config = base_config();
        config.cache.ephemeral_port_range = (60000, 50000);
        assert!(validate(&config).is_err());
    }
}

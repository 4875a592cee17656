use duskwatch_core::config::load_from_path;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn tmp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_nanos();
    std::env::temp_dir().join(format!("duskwatch-{nanos}-{name}.toml"))
}

#[test]
fn loads_minimal_config() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let path = tmp_path("minimal");
    let toml = r#"
network = "10.20.0.0/16"

[collectors]
out-dir = "/tmp/duskwatch-out"
"#;
    fs::write(&path, toml)?;

    let cfg = load_from_path(&path)?;
    assert_eq!(cfg.network.network, "10.20.0.0/16");
    assert!(!cfg.network.enable_filters);
    assert_eq!(cfg.shards.count, 4);
    assert!(cfg.broker.daemons.is_empty());
    assert!(!cfg.raw_probe.enabled);
    Ok(())
}

#[test]
fn loads_broker_and_shards_overrides() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let path = tmp_path("broker");
    let toml = r#"
network = "10.20.0.0/16"
enable-filters = true

[collectors]
out-dir = "/tmp/duskwatch-out"

[shards]
count = 8

[broker]
daemons = ["scamper-a:31337", "scamper-b:31337"]

[raw_probe]
enabled = true
"#;
    fs::write(&path, toml)?;

    let cfg = load_from_path(&path)?;
    assert!(cfg.network.enable_filters);
    assert_eq!(cfg.shards.count, 8);
    assert_eq!(cfg.broker.daemons.len(), 2);
    assert!(cfg.raw_probe.enabled);
    Ok(())
}

#[test]
fn rejects_bad_subnet_and_zero_shards() {
    let path = tmp_path("invalid");
    let toml = r#"
network = "not-a-cidr"

[collectors]
out-dir = "/tmp/duskwatch-out"

[shards]
count = 0
"#;
    fs::write(&path, toml).unwrap();

    let err = load_from_path(&path).expect_err("invalid config should fail validation");
    let message = err.to_string();
    assert!(message.contains("subnet") || message.contains("shard"));
}

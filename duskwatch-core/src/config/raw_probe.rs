use serde::Deserialize;
use std::collections::HashMap;

/// The raw UDP transmitter, and its per-destination-port payload table.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawProbeConfig {
    /// Whether the raw transmitter thread is started at all.
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
    /// Per-destination-port payload table, keyed by decimal port number,
    /// values as lowercase hex strings. Falls back to the request's own
    /// payload (reflect mode) or a single default byte when a port has no
    /// entry.
    #[serde(default)]
    pub payloads: HashMap<u16, String>,
}

use serde::Deserialize;

/// Which addresses are "ours" (the darknet range) and how incoming packets
/// get filtered against it.
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// CIDR string naming the subnet considered "ours".
    /// Example: "10.20.0.0/16"
    pub network: String,
    /// When true, apply the address filters (local-subnet source rejection,
    /// non-local/multicast/loopback destination rejection).
    /// Default: false
    #[serde(default, rename = "enable-filters")]
    pub enable_filters: bool,
}

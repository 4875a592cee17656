use serde::Deserialize;

/// Probing defaults consulted by the per-shard spoofing belief store and
/// scheduler.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// How often a shard's rotating store advances a generation, in seconds.
    /// Default: 300 (5 minutes)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// How long a belief entry is trusted before it is considered stale, in
    /// seconds.
    /// Default: 3600 (60 minutes)
    #[serde(default = "default_entry_timeout_secs")]
    pub entry_timeout_secs: u64,
    /// Per-protocol probe counts sent per request.
    #[serde(default)]
    pub probe_counts: ProbeCounts,
    /// How long to wait for a probe reply before declaring loss, in seconds.
    /// Default: 20
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,
    /// Delay before a TCP RST probe may be reused against the same target,
    /// in seconds.
    /// Default: 5
    #[serde(default = "default_reset_delay_secs")]
    pub reset_delay_secs: u64,
    /// Inclusive ephemeral source port range used for outbound probes.
    /// Default: (49152, 65535)
    #[serde(default = "default_ephemeral_port_range")]
    pub ephemeral_port_range: (u16, u16),
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            cleanup_interval_secs: default_cleanup_interval_secs(),
            entry_timeout_secs: default_entry_timeout_secs(),
            probe_counts: ProbeCounts::default(),
            reply_timeout_secs: default_reply_timeout_secs(),
            reset_delay_secs: default_reset_delay_secs(),
            ephemeral_port_range: default_ephemeral_port_range(),
        }
    }
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

fn default_entry_timeout_secs() -> u64 {
    3600
}

fn default_reply_timeout_secs() -> u64 {
    20
}

fn default_reset_delay_secs() -> u64 {
    5
}

fn default_ephemeral_port_range() -> (u16, u16) {
    (49152, 65535)
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ProbeCounts {
    #[serde(default = "default_icmp_probes")]
    pub icmp: u8,
    #[serde(default = "default_udp_probes")]
    pub udp: u8,
    #[serde(default = "default_tcp_syn_probes")]
    pub tcp_syn: u8,
    #[serde(default = "default_tcp_rst_probes")]
    pub tcp_rst: u8,
}

impl Default for ProbeCounts {
    fn default() -> Self {
        ProbeCounts {
            icmp: default_icmp_probes(),
            udp: default_udp_probes(),
            tcp_syn: default_tcp_syn_probes(),
            tcp_rst: default_tcp_rst_probes(),
        }
    }
}

fn default_icmp_probes() -> u8 {
    5
}

fn default_udp_probes() -> u8 {
    5
}

fn default_tcp_syn_probes() -> u8 {
    1
}

fn default_tcp_rst_probes() -> u8 {
    2
}

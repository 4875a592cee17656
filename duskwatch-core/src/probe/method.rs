//! The closed set of probe methods the external daemon can be asked to run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    Icmp,
    Udp,
    TcpSyn,
    TcpRst,
}

impl ProbeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::Icmp => "icmp-echo",
            ProbeMethod::Udp => "udp",
            ProbeMethod::TcpSyn => "tcp-syn",
            ProbeMethod::TcpRst => "tcp-rst",
        }
    }

    /// Default number of probes sent per request for this method, per the
    /// engine's probing defaults.
    pub fn default_num_probes(&self) -> u8 {
        match self {
            ProbeMethod::Icmp => 5,
            ProbeMethod::Udp => 5,
            ProbeMethod::TcpSyn => 1,
            ProbeMethod::TcpRst => 2,
        }
    }
}

impl std::fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

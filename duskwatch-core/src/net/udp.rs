//! UDP record.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Udp {
    pub sport: u16,
    pub dport: u16,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

/// A bare UDP header as carried in the wire protocol (`length`, `checksum`
/// included) — distinct from `Udp`, which is the classifier's record of a
/// top-level UDP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHdr {
    pub sport: u16,
    pub dport: u16,
    pub length: u16,
    pub checksum: u16,
}

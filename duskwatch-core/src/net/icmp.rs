//! ICMP record: type plus an optionally embedded UDP header for
//! destination-unreachable messages.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IcmpType {
    EchoReply,
    DestUnreachable,
    SourceQuench,
    Redirect,
    Echo,
    TimeExceeded,
    ParamProblem,
    TimestampRequest,
    TimestampReply,
    Other,
}

impl IcmpType {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => IcmpType::EchoReply,
            3 => IcmpType::DestUnreachable,
            4 => IcmpType::SourceQuench,
            5 => IcmpType::Redirect,
            8 => IcmpType::Echo,
            11 => IcmpType::TimeExceeded,
            12 => IcmpType::ParamProblem,
            13 => IcmpType::TimestampRequest,
            14 => IcmpType::TimestampReply,
            _ => IcmpType::Other,
        }
    }
}

/// A UDP header embedded in an ICMP destination-unreachable payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmbeddedUdpHeader {
    pub sport: u16,
    pub dport: u16,
    pub length: u16,
    pub checksum: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Icmp {
    #[serde(rename = "type")]
    pub icmp_type: IcmpType,
    pub unreachable: Option<EmbeddedUdpHeader>,
}

/// Extracts the embedded IPv4+UDP header from a destination-unreachable
/// ICMP payload. Requires at least 28 bytes: a 20-byte IPv4 header followed
/// by an 8-byte UDP header.
pub fn extract_embedded_udp(icmp_payload: &[u8]) -> Option<EmbeddedUdpHeader> {
    if icmp_payload.len() < 28 {
        return None;
    }
    let ihl = (icmp_payload[0] & 0x0F) as usize * 4;
    if ihl < 20 || icmp_payload.len() < ihl + 8 {
        return None;
    }
    let udp = &icmp_payload[ihl..ihl + 8];
    Some(EmbeddedUdpHeader {
        sport: u16::from_be_bytes([udp[0], udp[1]]),
        dport: u16::from_be_bytes([udp[2], udp[3]]),
        length: u16::from_be_bytes([udp[4], udp[5]]),
        checksum: u16::from_be_bytes([udp[6], udp[7]]),
    })
}

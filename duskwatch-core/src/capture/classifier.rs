//! Turns a raw captured IPv4 frame into a classified `Packet`, or a
//! rejection reason. Frames are handed over by whatever implements
//! `FrameSource` (see `capture::source`); this module knows nothing about
//! how they were captured.

use crate::net::icmp::{self, Icmp, IcmpType};
use crate::net::ipv4::Subnet;
use crate::net::packet::{Packet, TransportRecord};
use crate::net::tcp::{self, Tcp};
use crate::net::udp::Udp;
use crate::time::Timestamp;
use std::net::Ipv4Addr;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotIpv4,
    FilteredSource,
    FilteredDestination,
    UnsupportedTransport,
    Truncated,
}

/// Address filters applied in §4.3 step 3 of the classifier's procedure.
#[derive(Debug, Clone)]
pub struct Filters {
    pub enabled: bool,
    pub local_subnet: Subnet,
    pub blacklist: Vec<Ipv4Addr>,
}

impl Filters {
    pub fn disabled() -> Self {
        Filters {
            enabled: false,
            local_subnet: "0.0.0.0/0".parse().unwrap(),
            blacklist: Vec::new(),
        }
    }

    fn source_rejected(&self, saddr: Ipv4Addr) -> bool {
        self.enabled
            && (self.local_subnet.contains(saddr) || self.blacklist.contains(&saddr))
    }

    fn destination_rejected(&self, daddr: Ipv4Addr) -> bool {
        self.enabled
            && (!self.local_subnet.contains(daddr)
                || self.blacklist.contains(&daddr)
                || daddr.is_multicast()
                || daddr.is_loopback())
    }
}

/// The minimal shape of a captured IPv4 frame the classifier needs. This is
/// intentionally decoupled from any particular capture backend's frame type
/// — see `capture::source::FrameSource`.
pub struct RawFrame<'a> {
    pub ethertype: u16,
    pub ip_src: Ipv4Addr,
    pub ip_dst: Ipv4Addr,
    pub ip_id: u16,
    pub ttl: u8,
    pub l4_protocol: u8,
    pub l4_bytes: &'a [u8],
    pub observed: Timestamp,
}

const ETHERTYPE_IPV4: u16 = 0x0800;
const IPPROTO_ICMP: u8 = 1;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

/// Classifies one frame, applying `filters` if enabled.
pub fn classify(frame: &RawFrame<'_>, filters: &Filters) -> Result<Packet, Rejection> {
    if frame.ethertype != ETHERTYPE_IPV4 {
        return Err(Rejection::NotIpv4);
    }
    if filters.source_rejected(frame.ip_src) {
        return Err(Rejection::FilteredSource);
    }
    if filters.destination_rejected(frame.ip_dst) {
        return Err(Rejection::FilteredDestination);
    }

    let transport = match frame.l4_protocol {
        IPPROTO_ICMP => classify_icmp(frame.l4_bytes)?,
        IPPROTO_TCP => classify_tcp(frame.l4_bytes)?,
        IPPROTO_UDP => classify_udp(frame.l4_bytes)?,
        other => {
            trace!(proto = other, "encountered packet without a supported transport");
            return Err(Rejection::UnsupportedTransport);
        }
    };

    Ok(Packet {
        saddr: frame.ip_src,
        daddr: frame.ip_dst,
        ipid: frame.ip_id,
        ttl: frame.ttl,
        observed: frame.observed,
        transport,
    })
}

fn classify_icmp(bytes: &[u8]) -> Result<TransportRecord, Rejection> {
    if bytes.is_empty() {
        return Err(Rejection::Truncated);
    }
    let icmp_type = IcmpType::from_u8(bytes[0]);
    let unreachable = if icmp_type == IcmpType::DestUnreachable && bytes.len() > 8 {
        icmp::extract_embedded_udp(&bytes[8..])
    } else {
        None
    };
    Ok(TransportRecord::Icmp(Icmp {
        icmp_type,
        unreachable,
    }))
}

fn classify_tcp(bytes: &[u8]) -> Result<TransportRecord, Rejection> {
    if bytes.len() < 20 {
        return Err(Rejection::Truncated);
    }
    let sport = u16::from_be_bytes([bytes[0], bytes[1]]);
    let dport = u16::from_be_bytes([bytes[2], bytes[3]]);
    let seq = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let ack_seq = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let doff = (bytes[12] >> 4) as usize;
    let flags = bytes[13];
    let window = u16::from_be_bytes([bytes[14], bytes[15]]);

    let header_len = doff * 4;
    if header_len < 20 || bytes.len() < header_len {
        return Err(Rejection::Truncated);
    }
    let options = tcp::parse_options(&bytes[20..header_len]);

    let reported_payload_len = bytes.len() - header_len;
    let remaining = bytes.len() - header_len;
    let payload_len = reported_payload_len.min(remaining);
    let payload = bytes[header_len..header_len + payload_len].to_vec();

    Ok(TransportRecord::Tcp(Tcp {
        sport,
        dport,
        seq,
        ack_seq,
        syn: flags & 0x02 != 0,
        ack: flags & 0x10 != 0,
        rst: flags & 0x04 != 0,
        fin: flags & 0x01 != 0,
        window,
        options,
        payload,
    }))
}

fn classify_udp(bytes: &[u8]) -> Result<TransportRecord, Rejection> {
    if bytes.len() < 8 {
        return Err(Rejection::Truncated);
    }
    let sport = u16::from_be_bytes([bytes[0], bytes[1]]);
    let dport = u16::from_be_bytes([bytes[2], bytes[3]]);
    let reported_len = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
    let remaining = bytes.len() - 8;
    let payload_len = reported_len.saturating_sub(8).min(remaining);
    let payload = bytes[8..8 + payload_len].to_vec();
    Ok(TransportRecord::Udp(Udp {
        sport,
        dport,
        payload,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_frame(payload: &'static [u8]) -> RawFrame<'static> {
        RawFrame {
            ethertype: ETHERTYPE_IPV4,
            ip_src: Ipv4Addr::new(1, 2, 3, 4),
            ip_dst: Ipv4Addr::new(5, 6, 7, 8),
            ip_id: 42,
            ttl: 64,
            l4_protocol: IPPROTO_TCP,
            l4_bytes: payload,
            observed: Timestamp::from_millis(1),
        }
    }

    #[test]
    fn non_ipv4_is_rejected() {
        let mut frame = tcp_frame(&[]);
        frame.ethertype = 0x86DD;
        assert_eq!(classify(&frame, &Filters::disabled()), Err(Rejection::NotIpv4));
    }

    #[test]
    fn round_trips_tcp_fields() {
        // sport=1000 dport=2000 seq=1 ack=2 flags=SYN window=500, doff=5 (no options), payload "hi"
        let mut bytes = vec![];
        bytes.extend_from_slice(&1000u16.to_be_bytes());
        bytes.extend_from_slice(&2000u16.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.push(5 << 4); // doff = 5, no options
        bytes.push(0x02); // SYN
        bytes.extend_from_slice(&500u16.to_be_bytes());
        bytes.extend_from_slice(&[0, 0]); // checksum + urg (unused by classifier)
        bytes.extend_from_slice(b"hi");

        let frame = RawFrame {
            l4_bytes: &bytes,
            ..tcp_frame(&[])
        };
        let packet = classify(&frame, &Filters::disabled()).unwrap();
        if let TransportRecord::Tcp(tcp) = packet.transport {
            assert_eq!(tcp.sport, 1000);
            assert_eq!(tcp.dport, 2000);
            assert_eq!(tcp.seq, 1);
            assert!(tcp.syn);
            assert_eq!(tcp.payload, b"hi");
        } else {
            panic!("expected tcp");
        }
    }

    #[test]
    fn truncated_tcp_header_rejected() {
        let frame = tcp_frame(&[0u8; 10]);
        assert_eq!(classify(&frame, &Filters::disabled()), Err(Rejection::Truncated));
    }

    #[test]
    fn filters_drop_local_subnet_sources() {
        let filters = Filters {
            enabled: true,
            local_subnet: "1.2.3.0/24".parse().unwrap(),
            blacklist: vec![],
        };
        let frame = tcp_frame(&[0u8; 20]);
        assert_eq!(
            classify(&frame, &filters),
            Err(Rejection::FilteredSource)
        );
    }
}

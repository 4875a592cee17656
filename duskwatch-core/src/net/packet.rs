//! The classifier's output record, plus its two derived views.

use super::icmp::Icmp;
use super::protocol::Protocol;
use super::tcp::{Tcp, TcpOpt};
use super::udp::Udp;
use crate::time::Timestamp;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TransportRecord {
    Icmp(Icmp),
    Tcp(Tcp),
    Udp(Udp),
}

impl TransportRecord {
    pub fn protocol(&self) -> Protocol {
        match self {
            TransportRecord::Icmp(_) => Protocol::Icmp,
            TransportRecord::Tcp(_) => Protocol::Tcp,
            TransportRecord::Udp(_) => Protocol::Udp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub saddr: Ipv4Addr,
    pub daddr: Ipv4Addr,
    pub ipid: u16,
    pub ttl: u8,
    pub observed: Timestamp,
    pub transport: TransportRecord,
}

impl Packet {
    pub fn protocol(&self) -> Protocol {
        self.transport.protocol()
    }

    pub fn five_tuple(&self) -> FiveTuple {
        let (sport, dport) = match &self.transport {
            TransportRecord::Icmp(_) => (0, 0),
            TransportRecord::Tcp(t) => (t.sport, t.dport),
            TransportRecord::Udp(u) => (u.sport, u.dport),
        };
        FiveTuple {
            proto: self.protocol(),
            saddr: self.saddr,
            daddr: self.daddr,
            sport,
            dport,
        }
    }

    pub fn target_key(&self) -> TargetKey {
        let scanner_like = self.ipid == 54321
            || self.ttl > 200
            || matches!(&self.transport, TransportRecord::Tcp(t) if t.options.is_empty());
        TargetKey {
            saddr: self.saddr,
            scanner_like,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiveTuple {
    pub proto: Protocol,
    pub saddr: Ipv4Addr,
    pub daddr: Ipv4Addr,
    pub sport: u16,
    pub dport: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetKey {
    pub saddr: Ipv4Addr,
    pub scanner_like: bool,
}

/// Serializes to `{saddr, daddr, ipid, ttl, observed, protocol, <name>: {...}}`.
impl Serialize for Packet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry("saddr", &self.saddr.to_string())?;
        map.serialize_entry("daddr", &self.daddr.to_string())?;
        map.serialize_entry("ipid", &self.ipid)?;
        map.serialize_entry("ttl", &self.ttl)?;
        map.serialize_entry("observed", &self.observed.as_millis())?;
        let proto = self.protocol();
        map.serialize_entry("protocol", proto.as_str())?;
        match &self.transport {
            TransportRecord::Icmp(icmp) => map.serialize_entry("icmp", icmp)?,
            TransportRecord::Tcp(tcp) => map.serialize_entry("tcp", tcp)?,
            TransportRecord::Udp(udp) => map.serialize_entry("udp", udp)?,
        }
        map.end()
    }
}

/// JSON deserialization of a `Packet` is declared but unimplemented: the
/// JSON representation is a one-way reporting format, not a wire format we
/// need to read back. Reaching for it is a programming error.
impl<'de> Deserialize<'de> for Packet {
    fn deserialize<D>(_deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        panic!("Packet does not support JSON deserialization: the reporting format is write-only")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::tcp::TcpOptionSet;

    fn sample_tcp_packet() -> Packet {
        Packet {
            saddr: Ipv4Addr::new(1, 2, 3, 4),
            daddr: Ipv4Addr::new(5, 6, 7, 8),
            ipid: 100,
            ttl: 64,
            observed: Timestamp::from_millis(1_000),
            transport: TransportRecord::Tcp(Tcp {
                sport: 1111,
                dport: 80,
                seq: 0,
                ack_seq: 0,
                syn: true,
                ack: false,
                rst: false,
                fin: false,
                window: 65535,
                options: TcpOptionSet::new(),
                payload: vec![],
            }),
        }
    }

    #[test]
    fn five_tuple_carries_tcp_ports() {
        let p = sample_tcp_packet();
        let ft = p.five_tuple();
        assert_eq!(ft.sport, 1111);
        assert_eq!(ft.dport, 80);
        assert_eq!(ft.proto, Protocol::Tcp);
    }

    #[test]
    fn target_key_scanner_like_on_empty_options() {
        let p = sample_tcp_packet();
        assert!(p.target_key().scanner_like);
    }

    #[test]
    fn target_key_scanner_like_on_ipid() {
        let mut p = sample_tcp_packet();
        p.ipid = 54321;
        p.ttl = 10;
        if let TransportRecord::Tcp(t) = &mut p.transport {
            t.options.insert(TcpOpt::Mss);
        }
        assert!(p.target_key().scanner_like);
    }

    #[test]
    fn target_key_not_scanner_like() {
        let mut p = sample_tcp_packet();
        p.ipid = 1;
        p.ttl = 50;
        if let TransportRecord::Tcp(t) = &mut p.transport {
            t.options.insert(TcpOpt::Mss);
        }
        assert!(!p.target_key().scanner_like);
    }

    #[test]
    fn json_serialization_shape() {
        let p = sample_tcp_packet();
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(value["saddr"], "1.2.3.4");
        assert_eq!(value["protocol"], "tcp");
        assert!(value.get("tcp").is_some());
    }

    #[test]
    #[should_panic]
    fn deserialization_is_unsupported() {
        let _: Packet = serde_json::from_str("{}").unwrap();
    }
}

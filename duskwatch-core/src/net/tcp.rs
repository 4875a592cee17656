//! TCP record: header fields plus the observed (not decoded) option set.

use serde::Serialize;

/// The closed set of TCP option kinds we record membership of. Option
/// payload bodies are never parsed — only "this kind was present".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpOpt {
    Mss,
    WindowScale,
    SackPermitted,
    Sack,
    Timestamp,
    Other,
}

const KIND_ORDER: [TcpOpt; 6] = [
    TcpOpt::Mss,
    TcpOpt::WindowScale,
    TcpOpt::SackPermitted,
    TcpOpt::Sack,
    TcpOpt::Timestamp,
    TcpOpt::Other,
];

fn slot(kind: TcpOpt) -> usize {
    match kind {
        TcpOpt::Mss => 0,
        TcpOpt::WindowScale => 1,
        TcpOpt::SackPermitted => 2,
        TcpOpt::Sack => 3,
        TcpOpt::Timestamp => 4,
        TcpOpt::Other => 5,
    }
}

/// A membership-only record of which TCP option kinds occurred in a
/// header's option list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TcpOptionSet([bool; 6]);

impl TcpOptionSet {
    pub fn new() -> Self {
        TcpOptionSet::default()
    }

    pub fn insert(&mut self, kind: TcpOpt) {
        self.0[slot(kind)] = true;
    }

    pub fn contains(&self, kind: TcpOpt) -> bool {
        self.0[slot(kind)]
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| !b)
    }

    pub fn iter(&self) -> impl Iterator<Item = TcpOpt> + '_ {
        KIND_ORDER.iter().copied().filter(move |&k| self.contains(k))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tcp {
    pub sport: u16,
    pub dport: u16,
    pub seq: u32,
    pub ack_seq: u32,
    pub syn: bool,
    pub ack: bool,
    pub rst: bool,
    pub fin: bool,
    pub window: u16,
    pub options: TcpOptionSet,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

/// TCP option kind byte values, per RFC 793/1323/2018.
mod kind_byte {
    pub const END_OF_LIST: u8 = 0;
    pub const NOOP: u8 = 1;
    pub const MSS: u8 = 2;
    pub const WINDOW_SCALE: u8 = 3;
    pub const SACK_PERMITTED: u8 = 4;
    pub const SACK: u8 = 5;
    pub const TIMESTAMP: u8 = 8;
}

/// Walks a TCP option byte list (the bytes after the fixed 20-byte header,
/// up to `doff*4 - 20`), recording membership only — option payload bytes
/// are never interpreted.
pub fn parse_options(mut bytes: &[u8]) -> TcpOptionSet {
    let mut opts = TcpOptionSet::new();
    while !bytes.is_empty() {
        let kind = bytes[0];
        match kind {
            kind_byte::END_OF_LIST => break,
            kind_byte::NOOP => {
                bytes = &bytes[1..];
                continue;
            }
            _ => {}
        }
        if bytes.len() < 2 {
            break;
        }
        let optlen = bytes[1] as usize;
        if optlen < 2 || optlen > bytes.len() {
            break;
        }
        match kind {
            kind_byte::MSS => opts.insert(TcpOpt::Mss),
            kind_byte::WINDOW_SCALE => opts.insert(TcpOpt::WindowScale),
            kind_byte::SACK_PERMITTED => opts.insert(TcpOpt::SackPermitted),
            kind_byte::SACK => opts.insert(TcpOpt::Sack),
            kind_byte::TIMESTAMP => opts.insert(TcpOpt::Timestamp),
            _ => opts.insert(TcpOpt::Other),
        }
        bytes = &bytes[optlen..];
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_option_bytes_yield_empty_set() {
        assert!(parse_options(&[]).is_empty());
    }

    #[test]
    fn parses_mss_and_timestamp() {
        // MSS (kind 2, len 4, value) + NOP padding + timestamp (kind 8, len 10)
        let bytes = [2, 4, 0x05, 0xB4, 1, 8, 10, 0, 0, 0, 1, 0, 0, 0, 2];
        let opts = parse_options(&bytes);
        assert!(opts.contains(TcpOpt::Mss));
        assert!(opts.contains(TcpOpt::Timestamp));
        assert!(!opts.contains(TcpOpt::Sack));
    }

    #[test]
    fn unknown_kind_recorded_as_other() {
        let bytes = [200, 3, 0xFF];
        let opts = parse_options(&bytes);
        assert!(opts.contains(TcpOpt::Other));
    }
}

//! Pipe-delimited CSV row formatting for the three persisted output
//! streams. No CSV-writer crate is pulled in for this: the format is a
//! fixed, flat set of scalar columns with a `|` delimiter and no quoting,
//! so a `format!` join is the idiomatic-enough tool here.

use crate::net::packet::{Packet, TransportRecord};
use crate::net::tcp::TcpOpt;
use crate::probe::method::ProbeMethod;
use crate::scamper::reply::ProbeReply;

pub const RAW_PACKET_HEADER: &str =
    "ts|saddr|daddr|ipid|ttl|proto|sport|dport|anum|snum|options|payload|syn|ack|rst|fin|window size|probed|method|userid|probe anum|probe snum|num probes";

pub const PROBE_REPLY_HEADER: &str = "start sec|start usec|method|userid|num probes|saddr|daddr|sport|dport";

pub const TRACE_STATS_HEADER: &str = "ts|accepted|filtered|captured|errors|dropped|missing";

/// Probe-correlation fields attached to a raw packet record only when the
/// packet triggered (or was itself produced by) an outbound probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeCorrelation {
    pub method: Option<ProbeMethod>,
    pub userid: Option<u32>,
    pub probe_anum: Option<u32>,
    pub probe_snum: Option<u32>,
    pub num_probes: Option<u8>,
}

fn hex_payload(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn options_field(options_str: &str) -> &str {
    if options_str.is_empty() {
        "-"
    } else {
        options_str
    }
}

fn opt_field<T: std::fmt::Display>(value: Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

/// Formats one raw packet event row. `anum`/`snum` are the packet's own
/// sequence fields (TCP seq/ack, or 0 for non-TCP); `correlation` carries
/// the probe bookkeeping when this packet is tied to an outbound probe.
pub fn format_raw_packet_row(packet: &Packet, correlation: &ProbeCorrelation) -> String {
    let ts = packet.observed.unix_secs();
    let proto = packet.protocol().as_str();

    let (sport, dport, anum, snum, options, payload, syn, ack, rst, fin, window) = match &packet.transport {
        TransportRecord::Tcp(tcp) => {
            let opts: String = tcp
                .options
                .iter()
                .map(tcp_opt_name)
                .collect::<Vec<_>>()
                .join(",");
            (
                tcp.sport,
                tcp.dport,
                tcp.seq,
                tcp.ack_seq,
                opts,
                hex_payload(&tcp.payload),
                tcp.syn,
                tcp.ack,
                tcp.rst,
                tcp.fin,
                tcp.window,
            )
        }
        TransportRecord::Udp(udp) => (
            udp.sport,
            udp.dport,
            0,
            0,
            String::new(),
            hex_payload(&udp.payload),
            false,
            false,
            false,
            false,
            0,
        ),
        TransportRecord::Icmp(_) => (0, 0, 0, 0, String::new(), String::new(), false, false, false, false, 0),
    };

    let probed = correlation.method.is_some();

    format!(
        "{ts}|{saddr}|{daddr}|{ipid}|{ttl}|{proto}|{sport}|{dport}|{anum}|{snum}|{options}|{payload}|{syn}|{ack}|{rst}|{fin}|{window}|{probed}|{method}|{userid}|{probe_anum}|{probe_snum}|{num_probes}",
        saddr = packet.saddr,
        daddr = packet.daddr,
        ipid = packet.ipid,
        ttl = packet.ttl,
        options = options_field(&options),
        method = opt_field(correlation.method),
        userid = opt_field(correlation.userid),
        probe_anum = opt_field(correlation.probe_anum),
        probe_snum = opt_field(correlation.probe_snum),
        num_probes = opt_field(correlation.num_probes),
    )
}

fn tcp_opt_name(opt: TcpOpt) -> &'static str {
    match opt {
        TcpOpt::Mss => "mss",
        TcpOpt::WindowScale => "wscale",
        TcpOpt::SackPermitted => "sack-permitted",
        TcpOpt::Sack => "sack",
        TcpOpt::Timestamp => "timestamp",
        TcpOpt::Other => "other",
    }
}

/// Formats one probe reply row.
pub fn format_probe_reply_row(reply: &ProbeReply) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}",
        reply.start_sec,
        reply.start_usec,
        reply.method,
        reply.user_id,
        reply.num_probes,
        reply.saddr,
        reply.daddr,
        reply.sport,
        reply.dport,
    )
}

/// Per-thread capture counters, published once per interval as one trace
/// statistics row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceStats {
    pub ts: i64,
    pub accepted: u64,
    pub filtered: u64,
    pub captured: u64,
    pub errors: u64,
    pub dropped: u64,
    pub missing: u64,
}

pub fn format_trace_stats_row(stats: &TraceStats) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}",
        stats.ts, stats.accepted, stats.filtered, stats.captured, stats.errors, stats.dropped, stats.missing
    )
}

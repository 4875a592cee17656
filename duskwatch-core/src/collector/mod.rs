pub mod buffer;
pub mod csv;

pub use buffer::{Buffer, Downstream, MemoryDownstream, DEFAULT_RESERVE_SIZE, DEFAULT_WRITE_THRESHOLD};
pub use csv::{
    format_probe_reply_row, format_raw_packet_row, format_trace_stats_row, ProbeCorrelation, TraceStats,
    PROBE_REPLY_HEADER, RAW_PACKET_HEADER, TRACE_STATS_HEADER,
};

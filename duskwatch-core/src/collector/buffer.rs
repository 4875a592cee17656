//! Double-buffered, hour-rotating accumulation of pre-formatted CSV lines
//! before handoff to a downstream writer.

use crate::time::Timestamp;
use tracing::info;

/// Default soft hand-off threshold (16 MiB).
pub const DEFAULT_WRITE_THRESHOLD: usize = 16 * 1024 * 1024;
/// Default buffer reservation (17 MiB) — sized above the threshold so a
/// hand-off rarely needs to grow the replacement buffer mid-flight.
pub const DEFAULT_RESERVE_SIZE: usize = 17 * 1024 * 1024;

/// Receives a closed buffer tagged with the Unix-hour it was collecting.
pub trait Downstream: Send {
    fn accept(&mut self, hour: i64, data: Vec<u8>);
}

/// A `Downstream` that just appends each handed-off buffer's chunks, for
/// tests and small-scale use.
#[derive(Debug, Default)]
pub struct MemoryDownstream {
    pub handoffs: Vec<(i64, Vec<u8>)>,
}

impl Downstream for MemoryDownstream {
    fn accept(&mut self, hour: i64, data: Vec<u8>) {
        self.handoffs.push((hour, data));
    }
}

pub struct Buffer<D: Downstream> {
    current: Vec<u8>,
    next: Vec<u8>,
    write_threshold: usize,
    reserve_size: usize,
    hour: i64,
    downstream: D,
}

impl<D: Downstream> Buffer<D> {
    pub fn new(downstream: D) -> Self {
        Buffer::with_sizes(downstream, DEFAULT_RESERVE_SIZE, DEFAULT_WRITE_THRESHOLD)
    }

    pub fn with_sizes(downstream: D, reserve_size: usize, write_threshold: usize) -> Self {
        Buffer {
            current: Vec::with_capacity(reserve_size),
            next: Vec::with_capacity(reserve_size),
            write_threshold,
            reserve_size,
            hour: 0,
            downstream,
        }
    }

    /// Appends `line` (without a trailing newline) to the current buffer,
    /// then rotates according to `record_ts`'s hour and the size threshold.
    pub fn ingest(&mut self, line: &str, record_ts: Timestamp) {
        self.current.extend_from_slice(line.as_bytes());
        self.current.push(b'\n');

        let bucket = record_ts.hour_bucket();
        if bucket != self.hour {
            self.rotate_hour(bucket);
        } else if self.current.len() >= self.write_threshold {
            self.rotate_threshold();
        }
    }

    fn rotate_hour(&mut self, new_hour: i64) {
        let closing_hour = self.hour;
        let closed = std::mem::replace(&mut self.current, std::mem::take(&mut self.next));
        self.current.reserve(self.reserve_size.saturating_sub(self.current.capacity()));
        self.next = Vec::with_capacity(self.reserve_size);
        self.hour = new_hour;
        info!(hour = closing_hour, bytes = closed.len(), "rotating collector buffer on hour boundary");
        self.downstream.accept(closing_hour, closed);
    }

    fn rotate_threshold(&mut self) {
        let closed = std::mem::replace(&mut self.current, Vec::with_capacity(self.reserve_size));
        info!(hour = self.hour, bytes = closed.len(), "rotating collector buffer on size threshold");
        self.downstream.accept(self.hour, closed);
    }

    pub fn downstream(&self) -> &D {
        &self.downstream
    }

    pub fn downstream_mut(&mut self) -> &mut D {
        &mut self.downstream
    }

    /// Flushes any remaining bytes in the current buffer, for shutdown.
    pub fn flush(&mut self) {
        if !self.current.is_empty() {
            let closed = std::mem::take(&mut self.current);
            self.downstream.accept(self.hour, closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rotation_below_threshold_and_same_hour() {
        let mut buf = Buffer::with_sizes(MemoryDownstream::default(), 1024, 1024);
        buf.ingest("a", Timestamp::from_secs_micros(10, 0));
        buf.ingest("b", Timestamp::from_secs_micros(20, 0));
        assert!(buf.downstream().handoffs.is_empty());
        assert_eq!(buf.current.len(), 4); // "a\n" + "b\n"
    }

    #[test]
    fn rotates_on_hour_boundary() {
        let mut buf = Buffer::with_sizes(MemoryDownstream::default(), 1024, 1024);
        buf.ingest("first", Timestamp::from_secs_micros(10, 0));
        buf.ingest("second", Timestamp::from_secs_micros(3601, 0));
        assert_eq!(buf.downstream().handoffs.len(), 1);
        let (hour, data) = &buf.downstream().handoffs[0];
        assert_eq!(*hour, 0);
        assert_eq!(data, b"first\nsecond\n");
        assert_eq!(buf.hour, 3600);
    }

    #[test]
    fn rotates_on_size_threshold() {
        let mut buf = Buffer::with_sizes(MemoryDownstream::default(), 64, 9);
        buf.ingest("1234567", Timestamp::from_secs_micros(1, 0)); // 8 bytes with newline, below threshold
        assert!(buf.downstream().handoffs.is_empty());
        buf.ingest("x", Timestamp::from_secs_micros(1, 0)); // 10 bytes total, crosses threshold
        assert_eq!(buf.downstream().handoffs.len(), 1);
        assert_eq!(buf.downstream().handoffs[0].1, b"1234567\nx\n");
    }

    #[test]
    fn flush_hands_off_remaining_bytes() {
        let mut buf = Buffer::with_sizes(MemoryDownstream::default(), 1024, 1024);
        buf.ingest("leftover", Timestamp::from_secs_micros(5, 0));
        buf.flush();
        assert_eq!(buf.downstream().handoffs.len(), 1);
        assert_eq!(buf.downstream().handoffs[0].1, b"leftover\n");
    }
}

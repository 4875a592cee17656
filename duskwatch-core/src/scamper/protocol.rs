//! Newline-delimited line framing for the probing daemon's wire protocol.
//!
//! Bytes arrive in arbitrary TCP-segment-sized chunks; `ConnectionFramer`
//! buffers them and emits one `FrameEvent` per complete line regardless of
//! how the caller chose to split its `feed()` calls.

use super::uuencode::uudecode_line;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// `O` — acknowledgement of a previous command.
    Ok,
    /// `M` — one credit granted.
    More,
    /// `D <N>` — the next `N` bytes of inbound data carry an encoded record.
    DataAnnounce(u32),
    /// One uuencoded line consumed while `data_left > 0`. `decoded` is
    /// `None` if the line failed to uudecode (logged, dropped, connection
    /// stays open). `complete` is set once this line brings `data_left`
    /// down to zero, i.e. the announced record has now been fully received
    /// and can be handed to a decoder.
    DataLine { decoded: Option<Vec<u8>>, complete: bool },
    /// `E <...>` — error report from the daemon.
    Error(String),
    /// Anything else — logged and discarded.
    Unknown,
}

#[derive(Debug, Default)]
pub struct ConnectionFramer {
    buf: Vec<u8>,
    data_left: i64,
}

impl ConnectionFramer {
    pub fn new() -> Self {
        ConnectionFramer::default()
    }

    pub fn data_left(&self) -> i64 {
        self.data_left
    }

    /// Appends `bytes` to the internal buffer and extracts every complete
    /// line now available, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FrameEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        loop {
            let Some(nl) = self.buf.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buf.drain(..=nl).collect();
            let line = &line[..line.len() - 1]; // drop the newline itself
            events.push(self.process_line(line));
        }
        events
    }

    fn process_line(&mut self, line: &[u8]) -> FrameEvent {
        if self.data_left > 0 {
            let decoded = uudecode_line(line).ok();
            if decoded.is_none() {
                warn!("could not uudecode data line");
            }
            // The stripped newline counts toward the debited bytes too.
            self.data_left -= line.len() as i64 + 1;
            return FrameEvent::DataLine { decoded, complete: self.data_left <= 0 };
        }

        if line.is_empty() {
            return FrameEvent::Unknown;
        }
        match line[0] {
            b'O' => FrameEvent::Ok,
            b'M' => FrameEvent::More,
            b'D' => {
                let rest = std::str::from_utf8(&line[1..]).unwrap_or("").trim();
                match rest.parse::<u32>() {
                    Ok(n) => {
                        self.data_left = n as i64;
                        FrameEvent::DataAnnounce(n)
                    }
                    Err(_) => {
                        debug!("malformed data announcement: {:?}", String::from_utf8_lossy(line));
                        FrameEvent::Unknown
                    }
                }
            }
            b'E' => FrameEvent::Error(String::from_utf8_lossy(&line[1..]).trim().to_string()),
            _ => FrameEvent::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(events: &[FrameEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                FrameEvent::Ok => "ok",
                FrameEvent::More => "more",
                FrameEvent::DataAnnounce(_) => "data-announce",
                FrameEvent::DataLine { .. } => "data-line",
                FrameEvent::Error(_) => "error",
                FrameEvent::Unknown => "unknown",
            })
            .collect()
    }

    #[test]
    fn broker_framing_scenario_from_spec() {
        let stream = b"O\nM\nD 4\nX\nM\n";
        let mut framer = ConnectionFramer::new();
        let mut all_events = Vec::new();
        for chunk in stream.chunks(3) {
            all_events.extend(framer.feed(chunk));
        }
        assert_eq!(
            kinds(&all_events),
            vec!["ok", "more", "data-announce", "data-line", "more"]
        );
        let credits = all_events
            .iter()
            .filter(|e| matches!(e, FrameEvent::More))
            .count();
        assert_eq!(credits, 2);
    }

    #[test]
    fn arbitrary_chunking_yields_identical_directive_sequence() {
        let stream = b"O\nM\nD 4\nX\nM\n";
        let whole = {
            let mut framer = ConnectionFramer::new();
            kinds(&framer.feed(stream))
        };
        for chunk_size in 1..stream.len() {
            let mut framer = ConnectionFramer::new();
            let mut events = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                events.extend(framer.feed(chunk));
            }
            assert_eq!(kinds(&events), whole, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn data_left_tracks_line_length_plus_one() {
        let mut framer = ConnectionFramer::new();
        framer.feed(b"D 10\n");
        assert_eq!(framer.data_left(), 10);
        framer.feed(b"!!!\n"); // 3-byte payload line
        assert_eq!(framer.data_left(), 10 - 4);
    }

    #[test]
    fn error_line_captures_message() {
        let mut framer = ConnectionFramer::new();
        let events = framer.feed(b"E bad command\n");
        assert_eq!(events, vec![FrameEvent::Error("bad command".to_string())]);
    }
}

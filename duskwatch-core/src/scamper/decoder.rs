//! Per-connection probe-reply decoder: a dedicated OS thread that turns
//! accumulated record bytes into `ProbeReply` values, the same shape as
//! `rawprobe::transmitter`'s sender thread and grounded in the upstream
//! driver's `async_decoder` (a decode pair plus a notify pair, with the
//! worker's own event loop choosing `poll` or `kqueue` at build time).
//!
//! The upstream decoder parses WARTS binary records through scamper's own
//! C file-format library, which has no equivalent crate in this engine's
//! dependency set. This decoder instead parses a compact, self-consistent
//! binary layout carrying the same `ProbeReply` fields (`encode_record`/
//! `decode_record`) — a stand-in for WARTS the same way
//! `broker::serialize_request`'s text grammar stands in for the daemon's
//! real attach protocol.

use super::reply::{ProbeReply, ReplyStatistics};
use crate::error::{EngineError, Result};
use crate::probe::method::ProbeMethod;
use std::net::Ipv4Addr;
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{error, warn};

/// Owns one connection's decode worker thread. `feed_record` enqueues a
/// complete record's bytes (everything a `D <n>` announcement accumulated
/// across its `DataLine`s) and wakes the worker; `drain_replies` collects
/// whatever has been decoded since the last drain.
pub struct DecoderThread {
    inbox: Arc<Mutex<Vec<Vec<u8>>>>,
    outbox: Arc<Mutex<Vec<ProbeReply>>>,
    notify_write: RawFd,
    done: Arc<Mutex<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl DecoderThread {
    pub fn spawn() -> Result<Self> {
        let mut fds = [0 as RawFd; 2];
        // SAFETY: `fds` is a valid 2-element out-array for socketpair(2);
        // the call either fills both slots or returns an error we check.
        let rc = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(EngineError::Socket(format!("socketpair: {}", std::io::Error::last_os_error())));
        }
        let (notify_read, notify_write) = (fds[0], fds[1]);

        let inbox = Arc::new(Mutex::new(Vec::new()));
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(Mutex::new(false));

        let worker_inbox = Arc::clone(&inbox);
        let worker_outbox = Arc::clone(&outbox);
        let worker_done = Arc::clone(&done);
        let handle = std::thread::Builder::new()
            .name("scamper-decoder".into())
            .spawn(move || event_loop(worker_inbox, worker_outbox, worker_done, notify_read))
            .map_err(|err| EngineError::Socket(format!("spawn decoder thread: {err}")))?;

        Ok(DecoderThread {
            inbox,
            outbox,
            notify_write,
            done,
            handle: Some(handle),
        })
    }

    pub fn feed_record(&self, bytes: Vec<u8>) {
        self.inbox.lock().expect("decoder inbox poisoned").push(bytes);
        self.wake();
    }

    pub fn drain_replies(&self) -> Vec<ProbeReply> {
        std::mem::take(&mut *self.outbox.lock().expect("decoder outbox poisoned"))
    }

    pub fn shutdown(&mut self) {
        *self.done.lock().expect("decoder done flag poisoned") = true;
        self.wake();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn wake(&self) {
        let byte = [0u8];
        // SAFETY: `notify_write` is a valid, owned socketpair endpoint for
        // the lifetime of `self`; a short write of one byte cannot fail in
        // a way we need to act on beyond logging.
        let n = unsafe { libc::write(self.notify_write, byte.as_ptr() as *const _, 1) };
        if n < 0 {
            warn!(err = %std::io::Error::last_os_error(), "failed to wake decoder thread");
        }
    }
}

impl Drop for DecoderThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
        // SAFETY: `notify_write` is owned by this struct and not used after this point.
        unsafe {
            libc::close(self.notify_write);
        }
    }
}

#[cfg(target_os = "linux")]
fn event_loop(inbox: Arc<Mutex<Vec<Vec<u8>>>>, outbox: Arc<Mutex<Vec<ProbeReply>>>, done: Arc<Mutex<bool>>, notify_read: RawFd) {
    let mut pollfds = [libc::pollfd {
        fd: notify_read,
        events: libc::POLLIN,
        revents: 0,
    }];
    loop {
        if *done.lock().expect("decoder done flag poisoned") {
            break;
        }
        // SAFETY: `pollfds` is a valid array of the given length; poll(2)
        // only reads/writes within it.
        let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, 1000) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            error!(%err, "decoder poll failed");
            break;
        }
        if pollfds[0].revents & libc::POLLIN != 0 {
            let mut drain = [0u8; 64];
            // SAFETY: reads at most `drain.len()` bytes into a live buffer.
            unsafe {
                libc::read(notify_read, drain.as_mut_ptr() as *mut _, drain.len());
            }
        }
        drain_inbox(&inbox, &outbox);
    }
}

#[cfg(not(target_os = "linux"))]
fn event_loop(inbox: Arc<Mutex<Vec<Vec<u8>>>>, outbox: Arc<Mutex<Vec<ProbeReply>>>, done: Arc<Mutex<bool>>, notify_read: RawFd) {
    // SAFETY: kqueue(2) only allocates a new kernel event queue fd.
    let kq = unsafe { libc::kqueue() };
    if kq < 0 {
        error!(err = %std::io::Error::last_os_error(), "kqueue create failed");
        return;
    }
    let changes = [libc::kevent {
        ident: notify_read as libc::uintptr_t,
        filter: libc::EVFILT_READ,
        flags: libc::EV_ADD | libc::EV_ENABLE,
        fflags: 0,
        data: 0,
        udata: std::ptr::null_mut(),
    }];
    // SAFETY: registers one read-interest event on a valid kqueue fd; the
    // change list has length 1 and no output events are requested.
    unsafe {
        libc::kevent(kq, changes.as_ptr(), 1, std::ptr::null_mut(), 0, std::ptr::null());
    }
    let mut events = changes;
    loop {
        if *done.lock().expect("decoder done flag poisoned") {
            break;
        }
        let timeout = libc::timespec { tv_sec: 1, tv_nsec: 0 };
        // SAFETY: `events` is a valid 1-element out-array; kevent(2) writes
        // at most that many entries back into it.
        let rc = unsafe { libc::kevent(kq, std::ptr::null(), 0, events.as_mut_ptr(), 1, &timeout) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            error!(%err, "decoder kevent failed");
            break;
        }
        if rc > 0 {
            let mut drain = [0u8; 64];
            // SAFETY: reads at most `drain.len()` bytes into a live buffer.
            unsafe {
                libc::read(notify_read, drain.as_mut_ptr() as *mut _, drain.len());
            }
        }
        drain_inbox(&inbox, &outbox);
    }
    // SAFETY: `kq` is owned solely by this loop and not used after this point.
    unsafe {
        libc::close(kq);
    }
}

fn drain_inbox(inbox: &Arc<Mutex<Vec<Vec<u8>>>>, outbox: &Arc<Mutex<Vec<ProbeReply>>>) {
    let pending: Vec<Vec<u8>> = std::mem::take(&mut *inbox.lock().expect("decoder inbox poisoned"));
    if pending.is_empty() {
        return;
    }
    let mut decoded = outbox.lock().expect("decoder outbox poisoned");
    for record in pending {
        match decode_record(&record) {
            Some(reply) => decoded.push(reply),
            None => warn!(len = record.len(), "discarding malformed decode record"),
        }
    }
}

fn method_tag(method: ProbeMethod) -> u8 {
    match method {
        ProbeMethod::Icmp => 0,
        ProbeMethod::Udp => 1,
        ProbeMethod::TcpSyn => 2,
        ProbeMethod::TcpRst => 3,
    }
}

fn tag_method(tag: u8) -> Option<ProbeMethod> {
    match tag {
        0 => Some(ProbeMethod::Icmp),
        1 => Some(ProbeMethod::Udp),
        2 => Some(ProbeMethod::TcpSyn),
        3 => Some(ProbeMethod::TcpRst),
        _ => None,
    }
}

/// Encodes a `ProbeReply` into this decoder's fixed-plus-payload record
/// layout. Used by the broker's peer encoder in production and directly by
/// tests here; there is no reader in this crate for the real WARTS format.
pub fn encode_record(reply: &ProbeReply) -> Vec<u8> {
    let mut out = Vec::with_capacity(48 + reply.payload_hex.len());
    out.push(method_tag(reply.method));
    out.extend_from_slice(&u32::from(reply.saddr).to_be_bytes());
    out.extend_from_slice(&u32::from(reply.daddr).to_be_bytes());
    out.extend_from_slice(&reply.start_sec.to_be_bytes());
    out.extend_from_slice(&reply.start_usec.to_be_bytes());
    out.push(reply.num_probes);
    out.extend_from_slice(&reply.probe_size.to_be_bytes());
    out.extend_from_slice(&reply.user_id.to_be_bytes());
    out.push(reply.ttl);
    out.extend_from_slice(&reply.wait_secs.to_be_bytes());
    out.extend_from_slice(&reply.timeout_secs.to_be_bytes());
    out.extend_from_slice(&reply.sport.to_be_bytes());
    out.extend_from_slice(&reply.dport.to_be_bytes());
    out.extend_from_slice(&reply.flags.to_be_bytes());
    out.extend_from_slice(&reply.statistics.replies.to_be_bytes());
    out.extend_from_slice(&reply.statistics.loss.to_be_bytes());
    let payload = reply.payload_hex.as_bytes();
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

const RECORD_HEADER_LEN: usize = 1 + 4 + 4 + 8 + 8 + 1 + 2 + 4 + 1 + 4 + 4 + 2 + 2 + 4 + 4 + 4 + 2;

/// Decodes one record produced by `encode_record`. Returns `None` (logged
/// by the caller) on any length or tag mismatch rather than panicking —
/// a malformed record should drop the reply, not the connection.
fn decode_record(bytes: &[u8]) -> Option<ProbeReply> {
    if bytes.len() < RECORD_HEADER_LEN {
        return None;
    }
    let mut pos = 0;
    macro_rules! take {
        ($n:expr) => {{
            let slice = bytes.get(pos..pos + $n)?;
            pos += $n;
            slice
        }};
    }

    let method = tag_method(take!(1)[0])?;
    let saddr = Ipv4Addr::from(u32::from_be_bytes(take!(4).try_into().ok()?));
    let daddr = Ipv4Addr::from(u32::from_be_bytes(take!(4).try_into().ok()?));
    let start_sec = i64::from_be_bytes(take!(8).try_into().ok()?);
    let start_usec = i64::from_be_bytes(take!(8).try_into().ok()?);
    let num_probes = take!(1)[0];
    let probe_size = u16::from_be_bytes(take!(2).try_into().ok()?);
    let user_id = u32::from_be_bytes(take!(4).try_into().ok()?);
    let ttl = take!(1)[0];
    let wait_secs = u32::from_be_bytes(take!(4).try_into().ok()?);
    let timeout_secs = u32::from_be_bytes(take!(4).try_into().ok()?);
    let sport = u16::from_be_bytes(take!(2).try_into().ok()?);
    let dport = u16::from_be_bytes(take!(2).try_into().ok()?);
    let flags = u32::from_be_bytes(take!(4).try_into().ok()?);
    let replies = u32::from_be_bytes(take!(4).try_into().ok()?);
    let loss = u32::from_be_bytes(take!(4).try_into().ok()?);
    let payload_len = u16::from_be_bytes(take!(2).try_into().ok()?) as usize;
    let payload_bytes = bytes.get(pos..pos + payload_len)?;
    let payload_hex = String::from_utf8(payload_bytes.to_vec()).ok()?;

    Some(ProbeReply {
        method,
        saddr,
        daddr,
        start_sec,
        start_usec,
        num_probes,
        probe_size,
        user_id,
        ttl,
        wait_secs,
        timeout_secs,
        sport,
        dport,
        payload_hex,
        flags,
        statistics: ReplyStatistics { replies, loss },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProbeReply {
        ProbeReply {
            method: ProbeMethod::TcpSyn,
            saddr: Ipv4Addr::new(10, 0, 0, 1),
            daddr: Ipv4Addr::new(93, 184, 216, 34),
            start_sec: 1_700_000_000,
            start_usec: 42,
            num_probes: 3,
            probe_size: 64,
            user_id: 7,
            ttl: 64,
            wait_secs: 1,
            timeout_secs: 20,
            sport: 1111,
            dport: 80,
            payload_hex: "deadbeef".to_string(),
            flags: 0b101,
            statistics: ReplyStatistics { replies: 2, loss: 1 },
        }
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let reply = sample();
        let encoded = encode_record(&reply);
        let decoded = decode_record(&encoded).expect("valid record decodes");
        assert_eq!(decoded, reply);
    }

    #[test]
    fn truncated_record_is_rejected() {
        let encoded = encode_record(&sample());
        assert!(decode_record(&encoded[..RECORD_HEADER_LEN - 1]).is_none());
    }

    #[test]
    fn unknown_method_tag_is_rejected() {
        let mut encoded = encode_record(&sample());
        encoded[0] = 0xFF;
        assert!(decode_record(&encoded).is_none());
    }

    #[test]
    fn decoder_thread_decodes_fed_records() {
        let mut decoder = DecoderThread::spawn().expect("spawn decoder thread");
        decoder.feed_record(encode_record(&sample()));

        let mut replies = Vec::new();
        for _ in 0..200 {
            replies = decoder.drain_replies();
            if !replies.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(replies, vec![sample()]);
        decoder.shutdown();
    }
}

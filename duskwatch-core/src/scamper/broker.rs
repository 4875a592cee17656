//! The probe broker: a connection multiplexer speaking the newline-
//! delimited attach/MORE/DATA protocol to one or more external probing
//! daemons.
//!
//! The pure dispatch/credit/daddr-sweep logic lives in [`BrokerCore`] and is
//! unit-tested without any networking. [`Broker`] wraps it with the actual
//! tokio connection tasks: one task per configured daemon address, each
//! retrying on a 15s backoff, feeding parsed lines back to a single owning
//! task that holds `BrokerCore` and the write halves — matching the "single
//! mailbox" concurrency model the rest of the pipeline uses.

use super::decoder::DecoderThread;
use super::protocol::{ConnectionFramer, FrameEvent};
use super::reply::ProbeReply;
use crate::capture::router::ShardId;
use crate::error::Result;
use crate::probe::method::ProbeMethod;
use crate::probe::request::ProbeRequest;
use crate::telemetry::Metrics;
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

pub const RECONNECT_DELAY: Duration = Duration::from_secs(15);
const ATTACH_CMD: &[u8] = b"attach\n";
const DONE_CMD: &[u8] = b"done\n";

/// A request queued by a shard worker, before the broker has assigned it a
/// `user_id` or a swept destination address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequestTemplate {
    pub method: ProbeMethod,
    pub saddr: Ipv4Addr,
    pub sport: u16,
    pub dport: u16,
    pub anum: u32,
    pub num_probes: u8,
    pub requesting_shard: ShardId,
}

/// Walks `(daddr + 1) mod 2^24` composed with a fixed 24-bit prefix.
#[derive(Debug, Clone, Copy)]
pub struct DaddrSweep {
    prefix: u8,
    suffix: u32,
}

const SUFFIX_MASK: u32 = 0x00FF_FFFF;

impl DaddrSweep {
    pub fn new(prefix: u8) -> Self {
        DaddrSweep { prefix, suffix: 0 }
    }

    pub fn next(&mut self) -> Ipv4Addr {
        self.suffix = (self.suffix + 1) & SUFFIX_MASK;
        let bits = ((self.prefix as u32) << 24) | self.suffix;
        Ipv4Addr::from(bits)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub new: u32,
    pub more: u32,
    pub requested: u32,
    pub queued: u32,
}

#[derive(Debug, Default)]
struct ConnectionSlot {
    more: u32,
    requested: u32,
}

/// The broker's pure bookkeeping: connection credit, the pending request
/// queue, the user_id → shard correlation map, and per-second stats. No I/O.
pub struct BrokerCore {
    connections: Vec<ConnectionSlot>,
    queue: VecDeque<ProbeRequestTemplate>,
    user_id_counter: u32,
    in_flight: HashMap<u32, ShardId>,
    sweep: DaddrSweep,
    stats: BrokerStats,
    per_conn_stats: Vec<(u32, u32)>, // (more, requested) per connection
}

impl BrokerCore {
    pub fn new(connection_count: usize, daddr_prefix: u8) -> Self {
        BrokerCore {
            connections: (0..connection_count).map(|_| ConnectionSlot::default()).collect(),
            queue: VecDeque::new(),
            user_id_counter: 0,
            in_flight: HashMap::new(),
            sweep: DaddrSweep::new(daddr_prefix),
            stats: BrokerStats::default(),
            per_conn_stats: vec![(0, 0); connection_count],
        }
    }

    pub fn enqueue(&mut self, req: ProbeRequestTemplate) {
        self.queue.push_back(req);
        self.stats.queued += 1;
    }

    pub fn grant_credit(&mut self, conn: usize) {
        self.connections[conn].more += 1;
        self.stats.more += 1;
        self.per_conn_stats[conn].0 += 1;
    }

    /// Dispatches the current queue across every connection, in order, for
    /// as many credits as each connection currently holds. Returns the
    /// fully-assigned requests to write out, each tagged with its
    /// connection index.
    pub fn dispatch(&mut self) -> Vec<(usize, ProbeRequest)> {
        let mut out = Vec::new();
        for conn in 0..self.connections.len() {
            while self.connections[conn].more > 0 {
                let Some(template) = self.queue.pop_front() else {
                    break;
                };
                self.user_id_counter += 1;
                let user_id = self.user_id_counter;
                let daddr = self.sweep.next();
                self.in_flight.insert(user_id, template.requesting_shard);

                let req = ProbeRequest {
                    user_id,
                    method: template.method,
                    saddr: template.saddr,
                    daddr,
                    sport: template.sport,
                    dport: template.dport,
                    anum: template.anum,
                    num_probes: template.num_probes,
                };
                self.connections[conn].more -= 1;
                self.connections[conn].requested += 1;
                self.stats.requested += 1;
                self.per_conn_stats[conn].1 += 1;
                out.push((conn, req));
            }
        }
        out
    }

    /// Resolves and releases a reply's `user_id → shard` mapping. Returns
    /// `None` (logged, dropped, system stays live) if the id is unknown.
    pub fn resolve_reply(&mut self, user_id: u32) -> Option<ShardId> {
        self.in_flight.remove(&user_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Snapshots and resets the per-second counters.
    pub fn take_stats(&mut self) -> (BrokerStats, Vec<(u32, u32)>) {
        let stats = std::mem::take(&mut self.stats);
        let per_conn = std::mem::replace(&mut self.per_conn_stats, vec![(0, 0); self.connections.len()]);
        (stats, per_conn)
    }
}

/// Serializes a dispatched request using a plain text command grammar.
/// (The external daemon's actual documented grammar is outside this
/// engine's scope — this is the stand-in the broker writes and is only
/// required to be consistent with itself.)
pub fn serialize_request(req: &ProbeRequest) -> String {
    format!(
        "probe {} {} {} {} {} {} {}\n",
        req.method, req.saddr, req.daddr, req.sport, req.dport, req.anum, req.num_probes
    )
}

/// One configured daemon connection target.
#[derive(Debug, Clone)]
pub struct DaemonAddr {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for DaemonAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

enum ConnEvent {
    Connected(usize, tokio::net::tcp::OwnedWriteHalf),
    Line(usize, FrameEvent),
    Disconnected(usize),
}

/// Spawns the supervisor + reader task for one daemon connection. Retries
/// indefinitely on `RECONNECT_DELAY` after any connect failure or EOF.
async fn run_connection(
    idx: usize,
    addr: DaemonAddr,
    events_tx: mpsc::Sender<ConnEvent>,
    mut shutdown: watch::Receiver<bool>,
    metrics: Arc<Metrics>,
) {
    let mut attempt: u32 = 0;
    loop {
        if *shutdown.borrow() {
            return;
        }
        let stream = match TcpStream::connect((addr.host.as_str(), addr.port)).await {
            Ok(s) => s,
            Err(err) => {
                warn!(%addr, %err, "broker connection failed, retrying");
                if attempt > 0 {
                    metrics.broker_reconnects_total.inc();
                }
                attempt += 1;
                tokio::select! {
                    _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                    _ = shutdown.changed() => return,
                }
            }
        };
        info!(%addr, "broker attached");
        let (mut read_half, mut write_half) = stream.into_split();
        if write_half.write_all(ATTACH_CMD).await.is_err() {
            attempt += 1;
            continue;
        }
        if attempt > 0 {
            metrics.broker_reconnects_total.inc();
        }
        attempt += 1;
        metrics.broker_connections_active.inc();
        if events_tx.send(ConnEvent::Connected(idx, write_half)).await.is_err() {
            metrics.broker_connections_active.dec();
            return;
        }

        let mut framer = ConnectionFramer::new();
        let mut buf = [0u8; 4096];
        loop {
            tokio::select! {
                result = read_half.read(&mut buf) => {
                    match result {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            for event in framer.feed(&buf[..n]) {
                                if events_tx.send(ConnEvent::Line(idx, event)).await.is_err() {
                                    metrics.broker_connections_active.dec();
                                    return;
                                }
                            }
                        }
                    }
                }
                _ = shutdown.changed() => {
                    metrics.broker_connections_active.dec();
                    return;
                }
            }
        }
        metrics.broker_connections_active.dec();
        let _ = events_tx.send(ConnEvent::Disconnected(idx)).await;
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = shutdown.changed() => return,
        }
    }
}

/// Owns the single-threaded broker mailbox: `BrokerCore`, every
/// connection's write half, and the decoder thread per connection.
pub struct Broker {
    core: BrokerCore,
    writers: Vec<Option<tokio::net::tcp::OwnedWriteHalf>>,
    decoders: Vec<DecoderThread>,
    record_bufs: Vec<Vec<u8>>,
    request_tx: mpsc::Sender<ProbeRequestTemplate>,
    request_rx: mpsc::Receiver<ProbeRequestTemplate>,
    reply_tx: mpsc::Sender<(ShardId, ProbeReply)>,
    metrics: Arc<Metrics>,
}

impl Broker {
    pub fn new(
        connection_count: usize,
        daddr_prefix: u8,
        reply_tx: mpsc::Sender<(ShardId, ProbeReply)>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel(1024);
        let decoders = (0..connection_count)
            .map(|_| DecoderThread::spawn())
            .collect::<Result<Vec<_>>>()?;
        Ok(Broker {
            core: BrokerCore::new(connection_count, daddr_prefix),
            writers: (0..connection_count).map(|_| None).collect(),
            decoders,
            record_bufs: (0..connection_count).map(|_| Vec::new()).collect(),
            request_tx,
            request_rx,
            reply_tx,
            metrics,
        })
    }

    pub fn request_sender(&self) -> mpsc::Sender<ProbeRequestTemplate> {
        self.request_tx.clone()
    }

    /// Runs the broker's mailbox loop: connects to every `daemons` address,
    /// dispatches queued requests as credit allows, reports stats every
    /// second, and writes `done\n` to every active connection on shutdown.
    pub async fn run(mut self, daemons: Vec<DaemonAddr>, mut shutdown: watch::Receiver<bool>) {
        let (events_tx, mut events_rx) = mpsc::channel(1024);
        for (idx, addr) in daemons.into_iter().enumerate() {
            tokio::spawn(run_connection(idx, addr, events_tx.clone(), shutdown.clone(), self.metrics.clone()));
        }
        drop(events_tx);

        let mut report = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                Some(event) = events_rx.recv() => {
                    self.handle_conn_event(event).await;
                    self.flush_dispatch().await;
                    self.drain_decoders().await;
                }
                Some(template) = self.request_rx.recv() => {
                    self.core.enqueue(template);
                    self.flush_dispatch().await;
                }
                _ = report.tick() => {
                    self.drain_decoders().await;
                    self.report_stats();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.send_done_to_all().await;
                        return;
                    }
                }
            }
        }
    }

    async fn handle_conn_event(&mut self, event: ConnEvent) {
        match event {
            ConnEvent::Connected(idx, writer) => {
                self.writers[idx] = Some(writer);
            }
            ConnEvent::Disconnected(idx) => {
                self.writers[idx] = None;
                self.record_bufs[idx].clear();
            }
            ConnEvent::Line(idx, frame_event) => match frame_event {
                FrameEvent::Ok => {}
                FrameEvent::More => {
                    self.core.grant_credit(idx);
                }
                FrameEvent::DataAnnounce(_) => {
                    self.record_bufs[idx].clear();
                }
                FrameEvent::DataLine { decoded, complete } => {
                    if let Some(bytes) = decoded {
                        self.record_bufs[idx].extend_from_slice(&bytes);
                    }
                    if complete && !self.record_bufs[idx].is_empty() {
                        let record = std::mem::take(&mut self.record_bufs[idx]);
                        self.decoders[idx].feed_record(record);
                    }
                }
                FrameEvent::Error(msg) => error!(conn = idx, %msg, "probing daemon reported an error"),
                FrameEvent::Unknown => debug!(conn = idx, "discarding unrecognized daemon line"),
            },
        }
    }

    /// Collects whatever each connection's decoder thread has produced
    /// since the last drain and routes completed replies back to their
    /// requesting shard.
    async fn drain_decoders(&mut self) {
        for decoder in &self.decoders {
            for reply in decoder.drain_replies() {
                match self.core.resolve_reply(reply.user_id) {
                    Some(shard) => {
                        let _ = self.reply_tx.send((shard, reply)).await;
                    }
                    None => warn!(user_id = reply.user_id, "probe reply correlates to no known in-flight request"),
                }
            }
        }
    }

    async fn flush_dispatch(&mut self) {
        for (conn, req) in self.core.dispatch() {
            if let Some(writer) = &mut self.writers[conn] {
                let cmd = serialize_request(&req);
                if writer.write_all(cmd.as_bytes()).await.is_err() {
                    // The read-side of `run_connection` will observe the
                    // same failure and emit `Disconnected`; nothing further
                    // to do here but drop this connection's write half.
                    self.writers[conn] = None;
                }
            }
        }
    }

    async fn send_done_to_all(&mut self) {
        for writer in self.writers.iter_mut().flatten() {
            let _ = writer.write_all(DONE_CMD).await;
        }
    }

    fn report_stats(&mut self) {
        let (stats, per_conn) = self.core.take_stats();
        info!(
            new = stats.new,
            more = stats.more,
            requested = stats.requested,
            queued = stats.queued,
            "broker per-second report"
        );
        for (idx, (more, requested)) in per_conn.into_iter().enumerate() {
            debug!(conn = idx, more, requested, "per-connection report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(saddr: Ipv4Addr, shard: ShardId) -> ProbeRequestTemplate {
        ProbeRequestTemplate {
            method: ProbeMethod::TcpSyn,
            saddr,
            sport: 1111,
            dport: 80,
            anum: 0,
            num_probes: 1,
            requesting_shard: shard,
        }
    }

    #[test]
    fn daddr_sweep_wraps_at_24_bits() {
        let mut sweep = DaddrSweep::new(10);
        let first = sweep.next();
        assert_eq!(first, Ipv4Addr::new(10, 0, 0, 1));
        let mut last = first;
        for _ in 0..0x00FF_FFFE {
            last = sweep.next();
        }
        assert_eq!(last, Ipv4Addr::new(10, 0, 0, 0));
        let wrapped = sweep.next();
        assert_eq!(wrapped, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn dispatch_assigns_unique_user_ids_and_tracks_shard() {
        let mut core = BrokerCore::new(1, 10);
        core.grant_credit(0);
        core.grant_credit(0);
        core.enqueue(template(Ipv4Addr::new(1, 1, 1, 1), 3));
        core.enqueue(template(Ipv4Addr::new(1, 1, 1, 2), 5));

        let dispatched = core.dispatch();
        assert_eq!(dispatched.len(), 2);
        assert_ne!(dispatched[0].1.user_id, dispatched[1].1.user_id);
        assert_eq!(core.resolve_reply(dispatched[0].1.user_id), Some(3));
        assert_eq!(core.resolve_reply(dispatched[1].1.user_id), Some(5));
    }

    #[test]
    fn dispatch_fans_out_across_all_connections_per_cycle() {
        let mut core = BrokerCore::new(2, 10);
        core.grant_credit(0);
        core.grant_credit(1);
        core.enqueue(template(Ipv4Addr::new(1, 1, 1, 1), 0));
        core.enqueue(template(Ipv4Addr::new(1, 1, 1, 2), 0));

        let dispatched = core.dispatch();
        let conns: Vec<usize> = dispatched.iter().map(|(c, _)| *c).collect();
        assert_eq!(conns, vec![0, 1]);
    }

    #[test]
    fn no_credit_means_nothing_dispatched() {
        let mut core = BrokerCore::new(1, 10);
        core.enqueue(template(Ipv4Addr::new(1, 1, 1, 1), 0));
        assert!(core.dispatch().is_empty());
    }

    #[test]
    fn unknown_user_id_resolves_to_none() {
        let mut core = BrokerCore::new(1, 10);
        assert_eq!(core.resolve_reply(999), None);
    }
}

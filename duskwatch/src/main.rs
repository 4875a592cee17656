#![forbid(unsafe_code)]

use clap::Parser;
use duskwatch_core::capture::ShardId;
use duskwatch_core::collector::buffer::{Buffer, Downstream};
use duskwatch_core::collector::csv::{format_probe_reply_row, format_raw_packet_row, format_trace_stats_row, ProbeCorrelation, TraceStats};
use duskwatch_core::config::load_from_path;
use duskwatch_core::net::packet::Packet;
use duskwatch_core::probe::{ProbeMethod, Scheduler};
use duskwatch_core::rawprobe::{PayloadTable, Transmitter, UdpRequest};
use duskwatch_core::scamper::broker::{Broker, DaemonAddr, ProbeRequestTemplate};
use duskwatch_core::scamper::ProbeReply;
use duskwatch_core::telemetry::{init_logging, serve, Metrics};
use duskwatch_core::time::Timestamp;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Darknet capture-to-probe measurement engine")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,
}

/// Writes rotated buffer contents out to `out_dir/<hour>.csv`.
struct FileDownstream {
    out_dir: PathBuf,
    metrics: Arc<Metrics>,
}

impl Downstream for FileDownstream {
    fn accept(&mut self, hour: i64, data: Vec<u8>) {
        self.metrics.buffer_rotations_total.inc();
        let path = self.out_dir.join(format!("{hour}.csv"));
        if let Err(err) = std::fs::write(&path, &data) {
            error!(%err, ?path, "failed to write rotated collector buffer");
        }
    }
}

/// Accumulates the counters behind each second's `TraceStats` row. `errors`
/// counts requests a shard worker couldn't hand off to the broker; the
/// other upstream-capture counters (filtered/dropped/missing) belong to the
/// external capture library's own per-thread accounting (see
/// `capture::source::FrameSource`) and aren't observable from this process.
#[derive(Default)]
struct TraceCounters {
    accepted: AtomicU64,
    errors: AtomicU64,
}

impl TraceCounters {
    fn take(&self) -> (u64, u64) {
        (self.accepted.swap(0, Ordering::Relaxed), self.errors.swap(0, Ordering::Relaxed))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = init_logging(config.logging.filter.as_deref()) {
        eprintln!("failed to initialize logging: {err}");
        std::process::exit(1);
    }
    info!(network = %config.network.network, shards = config.shards.count, "configuration loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    if let Some(addr) = config.metrics.listen_addr.clone() {
        match addr.parse() {
            Ok(addr) => {
                let metrics = metrics.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    if let Err(err) = serve(addr, metrics, shutdown_rx).await {
                        error!(%err, "metrics endpoint exited with error");
                    }
                });
            }
            Err(err) => warn!(%err, %addr, "invalid metrics.listen-addr, endpoint disabled"),
        }
    }

    let (reply_tx, mut reply_rx) = mpsc::channel::<(ShardId, ProbeReply)>(1024);
    let daemons: Vec<DaemonAddr> = config
        .broker
        .daemons
        .iter()
        .filter_map(|entry| {
            let (host, port) = entry.rsplit_once(':')?;
            let port: u16 = port.parse().ok()?;
            Some(DaemonAddr { host: host.to_string(), port })
        })
        .collect();
    let broker = match Broker::new(daemons.len(), 0, reply_tx, metrics.clone()) {
        Ok(broker) => broker,
        Err(err) => {
            eprintln!("failed to start broker: {err}");
            std::process::exit(1);
        }
    };
    let broker_request_tx = broker.request_sender();
    {
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(broker.run(daemons, shutdown_rx));
    }

    let transmitter = if config.raw_probe.enabled {
        // `raw_probe.payloads` is keyed by destination port only; the
        // transmitter's table is keyed by full destination endpoint, so a
        // port-only entry can't be resolved to one without an address. A
        // real deployment would source per-endpoint payloads from the
        // daddr sweep rather than static configuration.
        let table = PayloadTable::new();
        match Transmitter::spawn(table) {
            Ok(t) => Some(Arc::new(t)),
            Err(err) => {
                error!(%err, "failed to start raw transmitter");
                None
            }
        }
    } else {
        None
    };

    let out_dir = PathBuf::from(&config.collectors.out_dir);
    if let Err(err) = std::fs::create_dir_all(&out_dir) {
        error!(%err, ?out_dir, "failed to create collector output directory");
    }

    let mut probe_reply_buffer: Buffer<FileDownstream> = Buffer::new(FileDownstream {
        out_dir: out_dir.join("probes"),
        metrics: metrics.clone(),
    });

    let (raw_packet_tx, mut raw_packet_rx) = mpsc::channel::<(Packet, ProbeCorrelation)>(1024);
    let mut raw_packet_buffer: Buffer<FileDownstream> = Buffer::new(FileDownstream {
        out_dir: out_dir.join("packets"),
        metrics: metrics.clone(),
    });
    let raw_packet_task = {
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    item = raw_packet_rx.recv() => {
                        match item {
                            Some((packet, correlation)) => {
                                let line = format_raw_packet_row(&packet, &correlation);
                                let ts = packet.observed;
                                raw_packet_buffer.ingest(&line, ts);
                            }
                            None => break,
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            raw_packet_buffer.flush();
        })
    };

    let trace_counters = Arc::new(TraceCounters::default());
    let mut trace_stats_buffer: Buffer<FileDownstream> = Buffer::new(FileDownstream {
        out_dir: out_dir.join("trace"),
        metrics: metrics.clone(),
    });
    let trace_stats_task = {
        let mut shutdown = shutdown_rx.clone();
        let trace_counters = trace_counters.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let (accepted, errors) = trace_counters.take();
                        let now = Timestamp::now();
                        let stats = TraceStats {
                            ts: now.unix_secs(),
                            accepted,
                            filtered: 0,
                            captured: accepted,
                            errors,
                            dropped: 0,
                            missing: 0,
                        };
                        let line = format_trace_stats_row(&stats);
                        trace_stats_buffer.ingest(&line, now);
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            trace_stats_buffer.flush();
        })
    };

    // Capture threads are supplied by the external parallel-capture
    // library (see the `FrameSource` boundary), not spawned by this
    // process; they hand classified packets to each shard's sender half
    // through whatever FFI entry point wraps that library. `_shard_senders`
    // is kept alive here only so the workers' receivers don't see their
    // channel close before that hookup exists.
    let shard_count = config.shards.count.max(1);
    let mut _shard_senders = Vec::with_capacity(shard_count);
    for shard_id in 0..shard_count {
        let (tx, rx) = mpsc::channel::<Packet>(1024);
        _shard_senders.push(tx);
        let metrics = metrics.clone();
        let broker_request_tx = broker_request_tx.clone();
        let transmitter = transmitter.clone();
        let shutdown_rx = shutdown_rx.clone();
        let raw_packet_tx = raw_packet_tx.clone();
        let trace_counters = trace_counters.clone();
        tokio::spawn(run_shard_worker(
            shard_id,
            rx,
            metrics,
            broker_request_tx,
            transmitter,
            raw_packet_tx,
            trace_counters,
            shutdown_rx,
        ));
    }
    drop(raw_packet_tx);

    let reply_loop = async {
        while let Some((_shard, reply)) = reply_rx.recv().await {
            metrics.probes_replied_total.inc();
            let line = format_probe_reply_row(&reply);
            let ts = Timestamp::from_secs_micros(reply.start_sec, reply.start_usec);
            probe_reply_buffer.ingest(&line, ts);
        }
    };

    tokio::select! {
        _ = reply_loop => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    }

    probe_reply_buffer.flush();
    let _ = raw_packet_task.await;
    let _ = trace_stats_task.await;
}

async fn run_shard_worker(
    shard_id: ShardId,
    mut rx: mpsc::Receiver<Packet>,
    metrics: Arc<Metrics>,
    broker_request_tx: mpsc::Sender<ProbeRequestTemplate>,
    transmitter: Option<Arc<Transmitter>>,
    raw_packet_tx: mpsc::Sender<(Packet, ProbeCorrelation)>,
    trace_counters: Arc<TraceCounters>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut scheduler = Scheduler::new();
    let mut anum: u32 = 0;
    loop {
        tokio::select! {
            packet = rx.recv() => {
                let Some(packet) = packet else { break };
                metrics.packets_routed_per_shard.with_label_values(&[&shard_id.to_string()]).inc();
                trace_counters.accepted.fetch_add(1, Ordering::Relaxed);
                let key = packet.target_key();
                let mut correlation = ProbeCorrelation::default();
                if let Some(method) = scheduler.decide(&packet, key) {
                    scheduler.mark_scheduled(key.saddr, packet.observed);
                    anum += 1;
                    metrics.probes_dispatched_total.inc();
                    correlation.method = Some(method);
                    correlation.probe_anum = Some(anum);
                    correlation.num_probes = Some(method.default_num_probes());
                    match (method, &transmitter) {
                        (ProbeMethod::Udp, Some(transmitter)) => {
                            let five_tuple = packet.five_tuple();
                            transmitter.send(UdpRequest {
                                saddr: five_tuple.daddr,
                                daddr: five_tuple.saddr,
                                sport: five_tuple.dport,
                                dport: five_tuple.sport,
                                payload: Vec::new(),
                            });
                        }
                        _ => {
                            let five_tuple = packet.five_tuple();
                            let template = ProbeRequestTemplate {
                                method,
                                saddr: five_tuple.saddr,
                                sport: five_tuple.sport,
                                dport: five_tuple.dport,
                                anum,
                                num_probes: method.default_num_probes(),
                                requesting_shard: shard_id,
                            };
                            if broker_request_tx.send(template).await.is_err() {
                                warn!(shard = shard_id, "broker request channel closed");
                                trace_counters.errors.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }
                if raw_packet_tx.send((packet, correlation)).await.is_err() {
                    warn!(shard = shard_id, "raw packet channel closed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

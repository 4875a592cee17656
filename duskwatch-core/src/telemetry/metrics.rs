//! Process-health counters and gauges, registered against the `prometheus`
//! crate's default text exposition format.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub struct Metrics {
    pub registry: Registry,
    pub packets_routed_per_shard: IntCounterVec,
    pub probes_dispatched_total: IntCounter,
    pub probes_replied_total: IntCounter,
    pub broker_reconnects_total: IntCounter,
    pub buffer_rotations_total: IntCounter,
    pub broker_connections_active: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let packets_routed_per_shard = IntCounterVec::new(
            Opts::new("duskwatch_packets_routed_total", "packets routed per shard"),
            &["shard"],
        )
        .unwrap();
        let probes_dispatched_total =
            IntCounter::new("duskwatch_probes_dispatched_total", "outbound probe requests dispatched").unwrap();
        let probes_replied_total =
            IntCounter::new("duskwatch_probes_replied_total", "probe replies received").unwrap();
        let broker_reconnects_total =
            IntCounter::new("duskwatch_broker_reconnects_total", "broker daemon reconnect attempts").unwrap();
        let buffer_rotations_total =
            IntCounter::new("duskwatch_buffer_rotations_total", "collector buffer hand-offs").unwrap();
        let broker_connections_active =
            IntGauge::new("duskwatch_broker_connections_active", "currently attached daemon connections").unwrap();

        registry.register(Box::new(packets_routed_per_shard.clone())).unwrap();
        registry.register(Box::new(probes_dispatched_total.clone())).unwrap();
        registry.register(Box::new(probes_replied_total.clone())).unwrap();
        registry.register(Box::new(broker_reconnects_total.clone())).unwrap();
        registry.register(Box::new(buffer_rotations_total.clone())).unwrap();
        registry.register(Box::new(broker_connections_active.clone())).unwrap();

        Metrics {
            registry,
            packets_routed_per_shard,
            probes_dispatched_total,
            probes_replied_total,
            broker_reconnects_total,
            buffer_rotations_total,
            broker_connections_active,
        }
    }

    /// Renders every registered metric family in Prometheus text exposition
    /// format.
    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).expect("prometheus text encoding cannot fail for well-formed families");
        String::from_utf8(buf).expect("prometheus text encoder only emits valid utf-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_metric_names() {
        let metrics = Metrics::new();
        metrics.probes_dispatched_total.inc();
        let text = metrics.render();
        assert!(text.contains("duskwatch_probes_dispatched_total"));
        assert!(text.contains('1'));
    }
}

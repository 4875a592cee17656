//! Per-shard policy: given a packet's target key and the shard's own
//! spoofing-belief store, decide whether this source warrants an outbound
//! probe, and which method to use.

use crate::cache::{Entry, RotatingStore};
use crate::net::packet::{Packet, TargetKey, TransportRecord};
use crate::probe::method::ProbeMethod;
use crate::time::Timestamp;
use std::net::Ipv4Addr;

/// Owns the belief store for one shard. Not `Send`/`Sync` on purpose — per
/// the concurrency model, a shard's store has exactly one mutator, its own
/// worker thread/task.
pub struct Scheduler {
    beliefs: RotatingStore,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            beliefs: RotatingStore::new(),
        }
    }

    pub fn beliefs(&self) -> &RotatingStore {
        &self.beliefs
    }

    pub fn beliefs_mut(&mut self) -> &mut RotatingStore {
        &mut self.beliefs
    }

    /// Consults the belief store and the packet's target key; returns the
    /// probe method to dispatch, or `None` if no probe is warranted.
    ///
    /// Policy: only scanner-like sources are candidates at all. Among
    /// those, a source already believed `consistent` (not spoofed) within
    /// this belief generation is not re-probed — probing is reserved for
    /// sources whose consistency is unknown or in doubt.
    pub fn decide(&self, packet: &Packet, key: TargetKey) -> Option<ProbeMethod> {
        if !key.scanner_like {
            return None;
        }
        let belief = self.beliefs.get(key.saddr);
        if belief.consistent {
            return None;
        }
        Some(method_for(packet))
    }

    /// Records that a probe was scheduled for `saddr` at `now`, marking it
    /// tentatively consistent so that further packets from the same source
    /// within this belief generation don't re-trigger a probe before a
    /// reply can update the belief.
    pub fn mark_scheduled(&mut self, saddr: Ipv4Addr, now: Timestamp) {
        self.beliefs_mut().insert(saddr, Entry::new(now, true));
    }

    /// Applies a probe reply's outcome back into the belief store: a reply
    /// means the source is not blindly spoofing (assuming the reply's
    /// source address round-trips to the prober).
    pub fn record_reply(&mut self, saddr: Ipv4Addr, now: Timestamp, consistent: bool) {
        self.beliefs_mut().insert(saddr, Entry::new(now, consistent));
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

fn method_for(packet: &Packet) -> ProbeMethod {
    match &packet.transport {
        TransportRecord::Icmp(_) => ProbeMethod::Icmp,
        TransportRecord::Udp(_) => ProbeMethod::Udp,
        TransportRecord::Tcp(tcp) if tcp.syn => ProbeMethod::TcpSyn,
        TransportRecord::Tcp(_) => ProbeMethod::TcpRst,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::tcp::{Tcp, TcpOptionSet};

    fn scanner_packet(saddr: Ipv4Addr) -> Packet {
        Packet {
            saddr,
            daddr: Ipv4Addr::new(10, 0, 0, 1),
            ipid: 54321,
            ttl: 64,
            observed: Timestamp::from_millis(1),
            transport: TransportRecord::Tcp(Tcp {
                sport: 1,
                dport: 2,
                seq: 0,
                ack_seq: 0,
                syn: true,
                ack: false,
                rst: false,
                fin: false,
                window: 0,
                options: TcpOptionSet::new(),
                payload: vec![],
            }),
        }
    }

    #[test]
    fn non_scanner_like_is_never_probed() {
        let scheduler = Scheduler::new();
        let mut packet = scanner_packet(Ipv4Addr::new(1, 1, 1, 1));
        packet.ipid = 1;
        packet.ttl = 10;
        if let TransportRecord::Tcp(tcp) = &mut packet.transport {
            tcp.options.insert(crate::net::tcp::TcpOpt::Mss);
        }
        let key = packet.target_key();
        assert!(!key.scanner_like);
        assert_eq!(scheduler.decide(&packet, key), None);
    }

    #[test]
    fn scanner_like_with_unknown_belief_is_probed() {
        let scheduler = Scheduler::new();
        let packet = scanner_packet(Ipv4Addr::new(2, 2, 2, 2));
        let key = packet.target_key();
        assert_eq!(scheduler.decide(&packet, key), Some(ProbeMethod::TcpSyn));
    }

    #[test]
    fn already_consistent_source_is_not_reprobed() {
        let mut scheduler = Scheduler::new();
        let saddr = Ipv4Addr::new(3, 3, 3, 3);
        scheduler.mark_scheduled(saddr, Timestamp::from_millis(1));
        let packet = scanner_packet(saddr);
        let key = packet.target_key();
        assert_eq!(scheduler.decide(&packet, key), None);
    }
}

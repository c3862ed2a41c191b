use std::collections::HashMap;
use std::net::IpAddr;

use crate::classifier::FeatureVector;
use crate::pipeline::packet::{PacketRecord, Protocol};

/// Identity of one directionless flow: the exact 5-tuple as observed.
/// Source and destination are deliberately not canonicalized, two
/// directions of the same conversation share a key only because the
/// tuple fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: Protocol,
}

impl From<&PacketRecord> for FlowKey {
    fn from(packet: &PacketRecord) -> Self {
        Self {
            src_ip: packet.src_ip,
            dst_ip: packet.dst_ip,
            src_port: packet.src_port,
            dst_port: packet.dst_port,
            protocol: packet.protocol,
        }
    }
}

/// Running counters of a flow since its last drain.
#[derive(Debug, Clone, Default, PartialEq)]
struct FlowState {
    start_time: Option<f64>,
    fwd_packets: u64,
    bwd_packets: u64,
    fwd_bytes: u64,
    bwd_bytes: u64,
}

/// Endpoints cached per key so a drain can still report them after the
/// counters were reset.
#[derive(Debug, Clone)]
struct FlowMetadata {
    src_ip: IpAddr,
    dst_ip: IpAddr,
}

/// Aggregated counters of one flow at drain time, together with the
/// cached endpoints and the flush timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSnapshot {
    pub duration: f64,
    pub fwd_packets: u64,
    pub bwd_packets: u64,
    pub fwd_bytes: u64,
    pub bwd_bytes: u64,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub flushed_at_ms: u64,
}

impl FlowSnapshot {
    /// Reduce the snapshot to the fixed-order vector the classifier
    /// consumes. The index order is a hard contract, see [FeatureVector].
    pub fn features(&self) -> FeatureVector {
        FeatureVector([
            self.duration,
            self.fwd_packets as f64,
            self.bwd_packets as f64,
            self.fwd_bytes as f64,
            self.bwd_bytes as f64,
        ])
    }
}

/// Direction heuristic: a packet counts as forward when its source
/// address sorts lexicographically below its destination address.
/// This is a stable convention, not initiator detection; downstream
/// consumers depend on it staying as is.
fn is_forward(packet: &PacketRecord) -> bool {
    packet.src_ip.to_string() < packet.dst_ip.to_string()
}

/// Per-flow aggregation table. Single writer, no interior locking; the
/// capture loop is the only owner. Flows are never evicted, the table
/// grows with the number of distinct 5-tuples seen since start.
#[derive(Debug, Default)]
pub struct FlowTable {
    flows: HashMap<FlowKey, FlowState>,
    metadata: HashMap<FlowKey, FlowMetadata>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one packet against its flow, creating the flow on first
    /// sight. Returns the key so the caller can track touched flows.
    pub fn update(&mut self, packet: &PacketRecord, timestamp: f64) -> FlowKey {
        let key = FlowKey::from(packet);
        let flow = self.flows.entry(key.clone()).or_default();

        if flow.start_time.is_none() {
            flow.start_time = Some(timestamp);
        }

        self.metadata.insert(
            key.clone(),
            FlowMetadata {
                src_ip: packet.src_ip,
                dst_ip: packet.dst_ip,
            },
        );

        if is_forward(packet) {
            flow.fwd_packets += 1;
            flow.fwd_bytes += packet.size;
        } else {
            flow.bwd_packets += 1;
            flow.bwd_bytes += packet.size;
        }

        key
    }

    /// Snapshot the flow's aggregates and atomically reset its counters.
    /// Duration is zero for a flow that never saw a packet since the
    /// last reset. Unknown keys yield `None`.
    pub fn drain(&mut self, key: &FlowKey, timestamp: f64) -> Option<FlowSnapshot> {
        let flow = self.flows.get_mut(key)?;
        let metadata = self.metadata.get(key)?;

        let duration = flow.start_time.map_or(0.0, |start| timestamp - start);
        let snapshot = FlowSnapshot {
            duration,
            fwd_packets: flow.fwd_packets,
            bwd_packets: flow.bwd_packets,
            fwd_bytes: flow.fwd_bytes,
            bwd_bytes: flow.bwd_bytes,
            src_ip: metadata.src_ip,
            dst_ip: metadata.dst_ip,
            flushed_at_ms: (timestamp * 1000.0) as u64,
        };

        *flow = FlowState::default();

        Some(snapshot)
    }
}

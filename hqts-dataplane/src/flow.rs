use std::time::Instant;

use hqts_common::{FlowId, PolicyId, QueueId};
use rustc_hash::FxHashMap;

/// How a flow's queue sheds load under pressure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DropPolicy {
    #[default]
    TailDrop,
    Red,
    Wred,
}

/// Whether the flow currently meets its contracted rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlaStatus {
    Conforming,
    NonConforming,
    #[default]
    Unknown,
}

/// Byte/packet counters and sighting timestamps for one flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowStats {
    pub bytes_processed: u64,
    pub packets_processed: u64,
    pub bytes_dropped: u64,
    pub packets_dropped: u64,
    pub first_seen: Option<Instant>,
    pub last_seen: Option<Instant>,
}

/// Live per-flow state, created at first sighting and kept until the flow is
/// evicted. The policer updates the stats and SLA verdict; schedulers may
/// track the queue depth.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub flow_id: FlowId,
    pub policy_id: PolicyId,
    pub queue_id: QueueId,
    pub current_queue_depth_bytes: u32,
    pub drop_policy: DropPolicy,
    pub stats: FlowStats,
    pub sla_status: SlaStatus,
    pub last_seen: Option<Instant>,
}

impl FlowContext {
    pub fn new(
        flow_id: FlowId,
        policy_id: PolicyId,
        queue_id: QueueId,
        drop_policy: DropPolicy,
    ) -> Self {
        Self {
            flow_id,
            policy_id,
            queue_id,
            current_queue_depth_bytes: 0,
            drop_policy,
            stats: FlowStats::default(),
            sla_status: SlaStatus::Unknown,
            last_seen: None,
        }
    }

    /// Records one policed packet of `len` bytes against this flow.
    pub fn record_packet(&mut self, len: u64, dropped: bool) {
        let now = Instant::now();
        self.stats.packets_processed += 1;
        self.stats.bytes_processed += len;
        if dropped {
            self.stats.packets_dropped += 1;
            self.stats.bytes_dropped += len;
        }
        if self.stats.first_seen.is_none() {
            self.stats.first_seen = Some(now);
        }
        self.stats.last_seen = Some(now);
        self.last_seen = Some(now);
    }
}

/// All live flows, keyed by flow id.
#[derive(Debug, Default)]
pub struct FlowTable {
    flows: FxHashMap<FlowId, FlowContext>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a context, returning the previous one for the same flow id.
    pub fn insert(&mut self, context: FlowContext) -> Option<FlowContext> {
        self.flows.insert(context.flow_id, context)
    }

    pub fn get(&self, flow_id: FlowId) -> Option<&FlowContext> {
        self.flows.get(&flow_id)
    }

    pub fn get_mut(&mut self, flow_id: FlowId) -> Option<&mut FlowContext> {
        self.flows.get_mut(&flow_id)
    }

    pub fn remove(&mut self, flow_id: FlowId) -> Option<FlowContext> {
        self.flows.remove(&flow_id)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlowContext> {
        self.flows.values()
    }
}

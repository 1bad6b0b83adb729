use std::time::Instant;

use hqts_common::{PolicyId, Priority, QueueId, NO_PARENT_POLICY_ID};

use crate::TokenBucket;

/// Scheduling discipline a policy's traffic is intended for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingAlgorithm {
    Wfq,
    Wrr,
    StrictPriority,
    Drr,
    Hfsc,
}

/// Byte and packet counters kept per policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyStats {
    pub bytes_processed: u64,
    pub packets_processed: u64,
    pub bytes_dropped: u64,
    pub packets_dropped: u64,
}

/// A shaping policy: identity, srTCM rates, scheduling intent, marking
/// targets, and live token-bucket state.
///
/// The CIR bucket is sized by the committed rate and burst, the PIR bucket by
/// the peak rate and excess burst. `children_ids` is derived and maintained
/// by the [`PolicyStore`](crate::PolicyStore); edits made to it inside
/// [`modify`](crate::PolicyStore::modify) are discarded.
#[derive(Debug, Clone)]
pub struct ShapingPolicy {
    pub id: PolicyId,
    pub parent_id: PolicyId,
    pub children_ids: Vec<PolicyId>,
    pub name: String,

    pub committed_rate_bps: u64,
    pub peak_rate_bps: u64,
    pub committed_burst_bytes: u64,
    pub excess_burst_bytes: u64,

    pub algorithm: SchedulingAlgorithm,
    pub weight: u32,
    pub priority_level: Priority,

    pub drop_on_red: bool,
    pub target_priority_green: Priority,
    pub target_priority_yellow: Priority,
    pub target_priority_red: Priority,
    pub target_queue_id_green: QueueId,
    pub target_queue_id_yellow: QueueId,
    pub target_queue_id_red: QueueId,

    pub cir_bucket: TokenBucket,
    pub pir_bucket: TokenBucket,
    pub stats: PolicyStats,
    pub last_updated: Instant,
}

impl ShapingPolicy {
    /// Creates a root-or-child policy with full buckets and neutral marking
    /// targets. Scheduling intent and marking are set with the `with_*`
    /// builders.
    pub fn new(
        id: PolicyId,
        parent_id: PolicyId,
        name: impl Into<String>,
        committed_rate_bps: u64,
        peak_rate_bps: u64,
        committed_burst_bytes: u64,
        excess_burst_bytes: u64,
    ) -> Self {
        Self {
            id,
            parent_id,
            children_ids: Vec::new(),
            name: name.into(),
            committed_rate_bps,
            peak_rate_bps,
            committed_burst_bytes,
            excess_burst_bytes,
            algorithm: SchedulingAlgorithm::Wfq,
            weight: 1,
            priority_level: 0,
            drop_on_red: false,
            target_priority_green: 0,
            target_priority_yellow: 0,
            target_priority_red: 0,
            target_queue_id_green: 0,
            target_queue_id_yellow: 0,
            target_queue_id_red: 0,
            cir_bucket: TokenBucket::new(committed_rate_bps, committed_burst_bytes),
            pir_bucket: TokenBucket::new(peak_rate_bps, excess_burst_bytes),
            stats: PolicyStats::default(),
            last_updated: Instant::now(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: SchedulingAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_priority_level(mut self, priority_level: Priority) -> Self {
        self.priority_level = priority_level;
        self
    }

    pub fn with_drop_on_red(mut self, drop_on_red: bool) -> Self {
        self.drop_on_red = drop_on_red;
        self
    }

    /// Per-color target priorities applied by the policer.
    pub fn with_priority_targets(mut self, green: Priority, yellow: Priority, red: Priority) -> Self {
        self.target_priority_green = green;
        self.target_priority_yellow = yellow;
        self.target_priority_red = red;
        self
    }

    /// Per-color target queue ids applied by the policer.
    pub fn with_queue_targets(mut self, green: QueueId, yellow: QueueId, red: QueueId) -> Self {
        self.target_queue_id_green = green;
        self.target_queue_id_yellow = yellow;
        self.target_queue_id_red = red;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == NO_PARENT_POLICY_ID
    }

    /// Stamps the policy as just-updated.
    pub fn touch(&mut self) {
        self.last_updated = Instant::now();
    }
}

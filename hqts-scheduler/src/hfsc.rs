use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap, VecDeque},
};

use hqts_common::{FlowId, BITS_PER_BYTE, MICROS_PER_SEC};

use crate::{ConfigError, PacketDescriptor, Scheduler, SchedulerError};

/// Parent id carried by root classes.
const NO_PARENT: FlowId = 0;

/// One segment of an HFSC service curve: a rate plus an initial delay.
///
/// A zero rate means the curve is inactive; packets never finish on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceCurve {
    pub rate_bps: u64,
    pub delay_us: u64,
}

impl ServiceCurve {
    pub const fn new(rate_bps: u64, delay_us: u64) -> Self {
        Self { rate_bps, delay_us }
    }

    fn is_active(&self) -> bool {
        self.rate_bps > 0
    }

    /// Virtual service time of `len` bytes on this curve, in microseconds.
    fn service_time_us(&self, len: u32) -> u64 {
        if self.rate_bps == 0 {
            return u64::MAX;
        }
        (u64::from(len) * BITS_PER_BYTE).saturating_mul(MICROS_PER_SEC) / self.rate_bps
    }
}

/// Per-flow (or per-class) configuration: the three curves plus an optional
/// parent class. Parents bound their children's start times but carry no
/// queue of their own.
#[derive(Debug, Clone)]
pub struct HfscFlowConfig {
    pub id: FlowId,
    pub parent_id: FlowId,
    pub real_time: ServiceCurve,
    pub link_share: ServiceCurve,
    pub upper_limit: ServiceCurve,
}

impl HfscFlowConfig {
    pub fn new(id: FlowId, parent_id: FlowId, real_time: ServiceCurve) -> Self {
        Self {
            id,
            parent_id,
            real_time,
            link_share: ServiceCurve::default(),
            upper_limit: ServiceCurve::default(),
        }
    }

    pub fn with_link_share(mut self, link_share: ServiceCurve) -> Self {
        self.link_share = link_share;
        self
    }

    pub fn with_upper_limit(mut self, upper_limit: ServiceCurve) -> Self {
        self.upper_limit = upper_limit;
        self
    }
}

#[derive(Debug)]
struct FlowState {
    queue: VecDeque<PacketDescriptor>,
    real_time: ServiceCurve,
    link_share: ServiceCurve,
    upper_limit: ServiceCurve,
    virtual_start_time: u64,
    virtual_finish_time: u64,
    virtual_finish_time_ul: u64,
    parent_id: FlowId,
    children_ids: Vec<FlowId>,
}

impl FlowState {
    fn from_config(config: &HfscFlowConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            real_time: config.real_time,
            link_share: config.link_share,
            upper_limit: config.upper_limit,
            virtual_start_time: 0,
            virtual_finish_time: 0,
            virtual_finish_time_ul: 0,
            parent_id: config.parent_id,
            children_ids: Vec::new(),
        }
    }
}

/// Eligible time and virtual finish time of the head packet on whichever of
/// the real-time / link-share curves finishes it first. `None` when both
/// curves are inactive.
fn best_candidate(
    base: u64,
    real_time: &ServiceCurve,
    link_share: &ServiceCurve,
    len: u32,
) -> Option<(u64, u64)> {
    let rt = real_time.is_active().then(|| {
        let eligible = base.saturating_add(real_time.delay_us);
        (eligible, eligible.saturating_add(real_time.service_time_us(len)))
    });
    let ls = link_share.is_active().then(|| {
        let eligible = base.saturating_add(link_share.delay_us);
        (eligible, eligible.saturating_add(link_share.service_time_us(len)))
    });
    match (rt, ls) {
        (Some(rt), Some(ls)) => Some(if rt.1 <= ls.1 { rt } else { ls }),
        (Some(rt), None) => Some(rt),
        (None, Some(ls)) => Some(ls),
        (None, None) => None,
    }
}

/// Hierarchical Fair Service Curve scheduler over a two-level class tree.
///
/// Each configured flow owns a FIFO queue, its three service curves, and
/// virtual-time state. The scheduler keeps a monotonic virtual clock in
/// microseconds and an eligible set ordered by `(virtual_finish_time,
/// flow_id)`; the flow-id tie-break makes service order deterministic.
/// `packet.flow_id` selects the flow on enqueue.
#[derive(Debug)]
pub struct HfscScheduler {
    flows: BTreeMap<FlowId, FlowState>,
    total_link_bandwidth_bps: u64,
    current_virtual_time: u64,
    total_packets: usize,
    eligible: BinaryHeap<Reverse<(u64, FlowId)>>,
}

impl HfscScheduler {
    /// Validates the flow set: unique non-zero ids, no self-parenting, every
    /// parent present, and no parent that is itself a child.
    pub fn new(
        flow_configs: Vec<HfscFlowConfig>,
        total_link_bandwidth_bps: u64,
    ) -> Result<Self, ConfigError> {
        if flow_configs.is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut flows: BTreeMap<FlowId, FlowState> = BTreeMap::new();
        for config in &flow_configs {
            if config.id == 0 {
                return Err(ConfigError::ReservedFlowId);
            }
            if config.id == config.parent_id {
                return Err(ConfigError::SelfParent(config.id));
            }
            if flows.insert(config.id, FlowState::from_config(config)).is_some() {
                return Err(ConfigError::DuplicateFlow(config.id));
            }
        }
        for config in &flow_configs {
            if config.parent_id == NO_PARENT {
                continue;
            }
            let Some(parent) = flows.get(&config.parent_id) else {
                return Err(ConfigError::UnknownParent {
                    child: config.id,
                    parent: config.parent_id,
                });
            };
            if parent.parent_id != NO_PARENT {
                return Err(ConfigError::TooDeep { child: config.id, parent: config.parent_id });
            }
            if let Some(parent) = flows.get_mut(&config.parent_id) {
                parent.children_ids.push(config.id);
            }
        }
        Ok(Self {
            flows,
            total_link_bandwidth_bps,
            current_virtual_time: 0,
            total_packets: 0,
            eligible: BinaryHeap::new(),
        })
    }

    pub fn num_flows(&self) -> usize {
        self.flows.len()
    }

    /// Packets pending in one flow's queue.
    pub fn flow_len(&self, flow_id: FlowId) -> Result<usize, SchedulerError> {
        self.flows.get(&flow_id).map(|f| f.queue.len()).ok_or(SchedulerError::UnknownFlow(flow_id))
    }

    /// Child classes configured under `flow_id`.
    pub fn children_of(&self, flow_id: FlowId) -> Result<&[FlowId], SchedulerError> {
        self.flows
            .get(&flow_id)
            .map(|f| f.children_ids.as_slice())
            .ok_or(SchedulerError::UnknownFlow(flow_id))
    }

    /// The scheduler's virtual clock, in microseconds. Non-decreasing across
    /// dequeues.
    pub fn virtual_time_us(&self) -> u64 {
        self.current_virtual_time
    }

    pub fn link_bandwidth_bps(&self) -> u64 {
        self.total_link_bandwidth_bps
    }

    /// Computes the head packet's eligible time and virtual finish time for
    /// `flow_id` and pushes the flow onto the eligible set.
    ///
    /// For a newly active flow the base eligible time is the later of the
    /// virtual clock and the flow's previous finish time; after a dequeue the
    /// clock itself is the base. The upper-limit curve and the parent's
    /// curves only push the start time out; the service time always comes
    /// from the flow's own governing curve.
    fn rearm_flow(&mut self, flow_id: FlowId, newly_active: bool) {
        let Some(flow) = self.flows.get(&flow_id) else { return };
        let Some(head) = flow.queue.front() else { return };
        let len = head.packet_length_bytes;

        let base = if newly_active {
            self.current_virtual_time.max(flow.virtual_finish_time)
        } else {
            self.current_virtual_time
        };

        let Some((eligible_self, vft_self)) =
            best_candidate(base, &flow.real_time, &flow.link_share, len)
        else {
            // Both curves inactive: the flow cannot become eligible. The
            // upper-limit curve never grants eligibility on its own.
            return;
        };
        let service_time = vft_self - eligible_self;

        let mut final_eligible = eligible_self;
        if flow.upper_limit.is_active() {
            let eligible_ul = base
                .max(flow.virtual_finish_time_ul)
                .saturating_add(flow.upper_limit.delay_us);
            final_eligible = final_eligible.max(eligible_ul);
        }

        if flow.parent_id != NO_PARENT {
            if let Some(parent) = self.flows.get(&flow.parent_id) {
                let parent_base = self.current_virtual_time.max(parent.virtual_finish_time);
                if let Some((mut eligible_parent, _)) =
                    best_candidate(parent_base, &parent.real_time, &parent.link_share, len)
                {
                    if parent.upper_limit.is_active() {
                        let eligible_ul = parent_base
                            .max(parent.virtual_finish_time_ul)
                            .saturating_add(parent.upper_limit.delay_us);
                        eligible_parent = eligible_parent.max(eligible_ul);
                    }
                    final_eligible = final_eligible.max(eligible_parent);
                }
            }
        }

        let final_vft = final_eligible.saturating_add(service_time);
        if let Some(flow) = self.flows.get_mut(&flow_id) {
            flow.virtual_start_time = final_eligible;
            flow.virtual_finish_time = final_vft;
            if flow.upper_limit.is_active() {
                flow.virtual_finish_time_ul =
                    final_eligible.saturating_add(flow.upper_limit.service_time_us(len));
            }
        }
        self.eligible.push(Reverse((final_vft, flow_id)));
    }
}

impl Scheduler for HfscScheduler {
    fn enqueue(&mut self, packet: PacketDescriptor) -> Result<(), SchedulerError> {
        let flow_id = packet.flow_id;
        let Some(flow) = self.flows.get_mut(&flow_id) else {
            return Err(SchedulerError::UnknownFlow(flow_id));
        };
        let was_empty = flow.queue.is_empty();
        flow.queue.push_back(packet);
        self.total_packets += 1;
        if was_empty {
            self.rearm_flow(flow_id, true);
        }
        Ok(())
    }

    fn dequeue(&mut self) -> Result<PacketDescriptor, SchedulerError> {
        if self.total_packets == 0 {
            return Err(SchedulerError::Empty);
        }
        let Some(Reverse((vft, flow_id))) = self.eligible.pop() else {
            // Reachable only when every backlogged flow has zero-rate
            // real-time and link-share curves.
            return Err(SchedulerError::Inconsistent("packets pending but no flow is eligible"));
        };

        let Some(flow) = self.flows.get_mut(&flow_id) else {
            return Err(SchedulerError::Inconsistent("eligible set references an unknown flow"));
        };
        let Some(packet) = flow.queue.pop_front() else {
            return Err(SchedulerError::Inconsistent("eligible flow has an empty queue"));
        };
        self.total_packets -= 1;

        // The clock advances to the finish time of the serviced packet.
        self.current_virtual_time = self.current_virtual_time.max(vft);

        if flow.upper_limit.is_active() {
            flow.virtual_finish_time_ul = flow
                .virtual_start_time
                .saturating_add(flow.upper_limit.service_time_us(packet.packet_length_bytes));
        }

        if !flow.queue.is_empty() {
            self.rearm_flow(flow_id, false);
        }
        Ok(packet)
    }

    fn is_empty(&self) -> bool {
        self.total_packets == 0
    }

    fn len(&self) -> usize {
        self.total_packets
    }
}

//! Packet queues and the work-conserving scheduler family.
//!
//! Every scheduler owns its queues and exposes the same contract:
//! [`Scheduler::enqueue`] routes a packet to an internal queue,
//! [`Scheduler::dequeue`] picks the next packet under the discipline, and
//! [`Scheduler::is_empty`] / [`Scheduler::len`] report pending work. Pending
//! work only counts packets the AQM actually admitted.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod aqm;
mod drr;
mod errors;
mod hfsc;
mod packet;
mod strict;
mod wrr;

pub use aqm::{EnqueueOutcome, RedAqmParameters, RedAqmQueue};
pub use drr::{DrrQueueConfig, DrrScheduler};
pub use errors::{ConfigError, SchedulerError};
pub use hfsc::{HfscFlowConfig, HfscScheduler, ServiceCurve};
pub use packet::{ConformanceLevel, PacketDescriptor};
pub use strict::StrictPriorityScheduler;
pub use wrr::{WrrQueueConfig, WrrScheduler};

/// Common contract of the scheduler family.
pub trait Scheduler {
    /// Routes and enqueues a packet. AQM rejection is not an error: the
    /// pending-work count simply does not grow. Errors are reserved for
    /// packets that reference an unknown priority level, queue, or flow.
    fn enqueue(&mut self, packet: PacketDescriptor) -> Result<(), SchedulerError>;

    /// Removes and returns the next packet under the discipline.
    fn dequeue(&mut self) -> Result<PacketDescriptor, SchedulerError>;

    /// True when no packets are pending.
    fn is_empty(&self) -> bool;

    /// Number of admitted packets pending across all internal queues.
    fn len(&self) -> usize;
}

/// Runtime-selected scheduler.
///
/// The family shares one shape, so callers that pick a discipline from
/// configuration can hold this sum type instead of a trait object.
#[derive(Debug)]
pub enum AnyScheduler {
    StrictPriority(StrictPriorityScheduler),
    WeightedRoundRobin(WrrScheduler),
    DeficitRoundRobin(DrrScheduler),
    Hfsc(HfscScheduler),
}

impl Scheduler for AnyScheduler {
    fn enqueue(&mut self, packet: PacketDescriptor) -> Result<(), SchedulerError> {
        match self {
            Self::StrictPriority(s) => s.enqueue(packet),
            Self::WeightedRoundRobin(s) => s.enqueue(packet),
            Self::DeficitRoundRobin(s) => s.enqueue(packet),
            Self::Hfsc(s) => s.enqueue(packet),
        }
    }

    fn dequeue(&mut self) -> Result<PacketDescriptor, SchedulerError> {
        match self {
            Self::StrictPriority(s) => s.dequeue(),
            Self::WeightedRoundRobin(s) => s.dequeue(),
            Self::DeficitRoundRobin(s) => s.dequeue(),
            Self::Hfsc(s) => s.dequeue(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::StrictPriority(s) => s.is_empty(),
            Self::WeightedRoundRobin(s) => s.is_empty(),
            Self::DeficitRoundRobin(s) => s.is_empty(),
            Self::Hfsc(s) => s.is_empty(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::StrictPriority(s) => s.len(),
            Self::WeightedRoundRobin(s) => s.len(),
            Self::DeficitRoundRobin(s) => s.len(),
            Self::Hfsc(s) => s.len(),
        }
    }
}

impl From<StrictPriorityScheduler> for AnyScheduler {
    fn from(s: StrictPriorityScheduler) -> Self {
        Self::StrictPriority(s)
    }
}

impl From<WrrScheduler> for AnyScheduler {
    fn from(s: WrrScheduler) -> Self {
        Self::WeightedRoundRobin(s)
    }
}

impl From<DrrScheduler> for AnyScheduler {
    fn from(s: DrrScheduler) -> Self {
        Self::DeficitRoundRobin(s)
    }
}

impl From<HfscScheduler> for AnyScheduler {
    fn from(s: HfscScheduler) -> Self {
        Self::Hfsc(s)
    }
}

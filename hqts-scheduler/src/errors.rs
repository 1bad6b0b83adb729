use hqts_common::{FlowId, QueueId};
use thiserror::Error;

/// Construction-time validation failures for queues and schedulers.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("scheduler needs at least one queue")]
    Empty,
    #[error("queue {0}: weight must be greater than zero")]
    ZeroWeight(QueueId),
    #[error("queue {0}: quantum must be greater than zero")]
    ZeroQuantum(QueueId),
    #[error("duplicate queue id {0}")]
    DuplicateQueue(QueueId),
    #[error("duplicate flow id {0}")]
    DuplicateFlow(FlowId),
    #[error("flow id 0 is reserved")]
    ReservedFlowId,
    #[error("flow {0} cannot be its own parent")]
    SelfParent(FlowId),
    #[error("flow {child}: parent {parent} is not configured")]
    UnknownParent { child: FlowId, parent: FlowId },
    #[error("flow {child}: parent {parent} is itself a child; hierarchies are two levels deep")]
    TooDeep { child: FlowId, parent: FlowId },
    #[error("red thresholds must satisfy 0 < min < max <= capacity (min {min}, max {max}, capacity {capacity})")]
    BadThresholds { min: u32, max: u32, capacity: u32 },
    #[error("max_probability must be in (0, 1], got {0}")]
    BadProbability(f64),
    #[error("ewma_weight must be in (0, 1], got {0}")]
    BadEwmaWeight(f64),
}

/// Runtime errors surfaced by the scheduler family.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is empty")]
    Empty,
    #[error("priority {priority} is out of range; {levels} levels configured")]
    PriorityOutOfRange { priority: u8, levels: usize },
    #[error("queue id {0} is not configured")]
    UnknownQueue(QueueId),
    #[error("flow id {0} is not configured")]
    UnknownFlow(FlowId),
    #[error("scheduler state inconsistent: {0}")]
    Inconsistent(&'static str),
}

//! Identifier types and unit constants shared by the HQTS crates.

/// Stable integer identifier for a classified flow, allocated monotonically
/// by the classifier. The value 0 is reserved as "invalid/unset".
pub type FlowId = u64;

/// Identifier of a shaping policy. The value 0 is reserved for "no parent".
pub type PolicyId = u64;

/// Identifier of a scheduler-internal queue.
pub type QueueId = u32;

/// Scheduling priority level. Numerically higher levels are served first.
pub type Priority = u8;

/// The reserved "invalid/unset" flow id.
pub const INVALID_FLOW_ID: FlowId = 0;

/// Parent id carried by root policies and root HFSC classes.
pub const NO_PARENT_POLICY_ID: PolicyId = 0;

/// Bits on the wire per byte of payload.
pub const BITS_PER_BYTE: u64 = 8;

/// Microseconds per second, for rate arithmetic in the microsecond domain.
pub const MICROS_PER_SEC: u64 = 1_000_000;

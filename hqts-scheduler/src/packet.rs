use bytes::Bytes;
use hqts_common::FlowId;

/// Conformance verdict produced by the two-rate three-color policer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConformanceLevel {
    /// Within the committed rate.
    #[default]
    Green,
    /// Above the committed rate but within the peak rate.
    Yellow,
    /// Above the peak rate.
    Red,
}

/// Unit of work flowing through the shaper and schedulers.
///
/// The policer overwrites `flow_id`, `priority`, and `conformance`; the
/// payload is opaque and never inspected. A default-constructed descriptor
/// (`packet_length_bytes == 0`) is the "no packet available" sentinel.
#[derive(Debug, Clone, Default)]
pub struct PacketDescriptor {
    pub flow_id: FlowId,
    pub packet_length_bytes: u32,
    pub priority: u8,
    pub conformance: ConformanceLevel,
    pub payload: Option<Bytes>,
}

impl PacketDescriptor {
    pub fn new(flow_id: FlowId, packet_length_bytes: u32) -> Self {
        Self { flow_id, packet_length_bytes, ..Default::default() }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    /// True for the "no packet available" sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.packet_length_bytes == 0
    }
}

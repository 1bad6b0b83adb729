use bytes::Bytes;
use hqts_dataplane::FiveTuple;
use hqts_scheduler::{PacketDescriptor, Scheduler, SchedulerError};
use thiserror::Error;
use tracing::debug;

use crate::{ShaperError, TrafficShaper};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Shaper(#[from] ShaperError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Thin orchestrator: classify, shape, enqueue on ingress; dequeue on egress.
pub struct PacketPipeline<'a, S> {
    shaper: TrafficShaper<'a>,
    scheduler: &'a mut S,
}

impl<'a, S: Scheduler> PacketPipeline<'a, S> {
    pub fn new(shaper: TrafficShaper<'a>, scheduler: &'a mut S) -> Self {
        Self { shaper, scheduler }
    }

    /// Runs one packet through classification and policing, then enqueues it
    /// when the shaper admits it. Returns the shaper's verdict; shaper drops
    /// and AQM rejections are normal outcomes, not errors.
    pub fn handle_incoming_packet(
        &mut self,
        five_tuple: &FiveTuple,
        packet_length_bytes: u32,
        payload: Option<Bytes>,
    ) -> Result<bool, PipelineError> {
        let mut packet = PacketDescriptor::new(0, packet_length_bytes);
        if let Some(payload) = payload {
            packet = packet.with_payload(payload);
        }

        if !self.shaper.process_packet(&mut packet, five_tuple)? {
            debug!(flow_id = packet.flow_id, "packet dropped by shaper");
            return Ok(false);
        }
        self.scheduler.enqueue(packet)?;
        Ok(true)
    }

    /// The next packet under the scheduling discipline, or the zero-length
    /// sentinel descriptor when nothing is pending.
    pub fn get_next_packet_to_transmit(&mut self) -> Result<PacketDescriptor, PipelineError> {
        if self.scheduler.is_empty() {
            return Ok(PacketDescriptor::default());
        }
        Ok(self.scheduler.dequeue()?)
    }
}

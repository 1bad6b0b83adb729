use std::sync::{Arc, Mutex, PoisonError};

use hqts_common::FlowId;
use hqts_dataplane::{FiveTuple, FlowClassifier, FlowTable, SlaStatus};
use hqts_policy::PolicyStore;
use hqts_scheduler::{ConformanceLevel, PacketDescriptor};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShaperError {
    #[error("flow {0} has no context in the flow table")]
    MissingFlowContext(FlowId),
}

/// The policer/marker.
///
/// For each packet: classify the 5-tuple, look up the flow's policy, run the
/// two-rate three-color decision against the policy's CIR/PIR buckets, and
/// mark conformance and target priority on the packet. The bucket mutation,
/// the verdict, and the policy counters all happen inside one
/// [`PolicyStore::modify`] critical section so consecutive packets of the
/// same policy observe consistent bucket state.
#[derive(Debug)]
pub struct TrafficShaper<'a> {
    policies: &'a mut PolicyStore,
    classifier: &'a FlowClassifier,
    flow_table: Arc<Mutex<FlowTable>>,
}

impl<'a> TrafficShaper<'a> {
    pub fn new(policies: &'a mut PolicyStore, classifier: &'a FlowClassifier) -> Self {
        let flow_table = classifier.flow_table();
        Self { policies, classifier, flow_table }
    }

    /// Polices one packet. Returns `Ok(true)` when the packet should be
    /// enqueued and `Ok(false)` when the shaper dropped it.
    ///
    /// A flow whose policy id is missing from the store is not an error: the
    /// packet is marked [`ConformanceLevel::Red`] and dropped, and the flow's
    /// drop counters advance.
    pub fn process_packet(
        &mut self,
        packet: &mut PacketDescriptor,
        five_tuple: &FiveTuple,
    ) -> Result<bool, ShaperError> {
        let flow_id = self.classifier.get_or_create_flow(five_tuple);
        packet.flow_id = flow_id;

        let policy_id = {
            let table = self.flow_table.lock().unwrap_or_else(PoisonError::into_inner);
            table.get(flow_id).ok_or(ShaperError::MissingFlowContext(flow_id))?.policy_id
        };

        let len = u64::from(packet.packet_length_bytes);
        let verdict = self.policies.modify(policy_id, |policy| {
            let conformance = if policy.cir_bucket.consume(len) {
                // srTCM aggregate accounting: green traffic debits the peak
                // bucket as well, so yellow headroom reflects all admitted
                // bytes.
                policy.pir_bucket.consume(len);
                ConformanceLevel::Green
            } else if policy.pir_bucket.consume(len) {
                ConformanceLevel::Yellow
            } else {
                ConformanceLevel::Red
            };

            let drop = conformance == ConformanceLevel::Red && policy.drop_on_red;
            policy.stats.packets_processed += 1;
            policy.stats.bytes_processed += len;
            if drop {
                policy.stats.packets_dropped += 1;
                policy.stats.bytes_dropped += len;
            }
            policy.touch();

            let priority = match conformance {
                ConformanceLevel::Green => policy.target_priority_green,
                ConformanceLevel::Yellow => policy.target_priority_yellow,
                ConformanceLevel::Red => policy.target_priority_red,
            };
            (conformance, drop, priority)
        });

        let (conformance, drop) = match verdict {
            Ok((conformance, drop, priority)) => {
                packet.conformance = conformance;
                if !drop {
                    packet.priority = priority;
                }
                (conformance, drop)
            }
            Err(_) => {
                warn!(flow_id, policy_id, "flow references a missing policy; dropping as red");
                packet.conformance = ConformanceLevel::Red;
                (ConformanceLevel::Red, true)
            }
        };

        self.record_flow_outcome(flow_id, len, drop, conformance)?;
        Ok(!drop)
    }

    fn record_flow_outcome(
        &self,
        flow_id: FlowId,
        len: u64,
        dropped: bool,
        conformance: ConformanceLevel,
    ) -> Result<(), ShaperError> {
        let mut table = self.flow_table.lock().unwrap_or_else(PoisonError::into_inner);
        let context = table.get_mut(flow_id).ok_or(ShaperError::MissingFlowContext(flow_id))?;
        context.record_packet(len, dropped);
        context.sla_status = match conformance {
            ConformanceLevel::Green | ConformanceLevel::Yellow => SlaStatus::Conforming,
            ConformanceLevel::Red => SlaStatus::NonConforming,
        };
        Ok(())
    }
}

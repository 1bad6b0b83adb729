use std::sync::{Arc, Mutex, PoisonError};

use hqts_common::{FlowId, PolicyId};
use hqts_policy::PolicyStore;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::{DropPolicy, FiveTuple, FlowContext, FlowTable};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("default policy {0} does not exist in the policy store")]
    UnknownDefaultPolicy(PolicyId),
}

#[derive(Debug)]
struct ClassifierInner {
    key_to_flow: FxHashMap<FiveTuple, FlowId>,
    next_flow_id: FlowId,
}

/// Maps 5-tuples to stable flow ids and materializes a [`FlowContext`] for
/// each new flow, bound to the configured default policy.
///
/// `get_or_create_flow` is thread-safe: the 5-tuple map sits behind a mutex
/// so multiple producer threads can classify concurrently before packets
/// funnel into a single pipeline instance. Flow ids are allocated
/// monotonically starting at 1; 0 stays reserved.
#[derive(Debug)]
pub struct FlowClassifier {
    inner: Mutex<ClassifierInner>,
    flow_table: Arc<Mutex<FlowTable>>,
    default_policy_id: PolicyId,
}

impl FlowClassifier {
    /// Fails when the default policy is missing from the store: every flow
    /// this classifier creates must reference an existing policy.
    pub fn new(
        flow_table: Arc<Mutex<FlowTable>>,
        default_policy_id: PolicyId,
        policies: &PolicyStore,
    ) -> Result<Self, ClassifierError> {
        if !policies.contains(default_policy_id) {
            return Err(ClassifierError::UnknownDefaultPolicy(default_policy_id));
        }
        Ok(Self {
            inner: Mutex::new(ClassifierInner {
                key_to_flow: FxHashMap::default(),
                next_flow_id: 1,
            }),
            flow_table,
            default_policy_id,
        })
    }

    /// Returns the flow id for `five_tuple`, allocating a fresh id and a
    /// default-policy context on first sighting.
    pub fn get_or_create_flow(&self, five_tuple: &FiveTuple) -> FlowId {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&flow_id) = inner.key_to_flow.get(five_tuple) {
            return flow_id;
        }

        let flow_id = inner.next_flow_id;
        inner.next_flow_id += 1;
        inner.key_to_flow.insert(*five_tuple, flow_id);

        let context =
            FlowContext::new(flow_id, self.default_policy_id, 0, DropPolicy::TailDrop);
        self.flow_table.lock().unwrap_or_else(PoisonError::into_inner).insert(context);
        debug!(flow_id, policy_id = self.default_policy_id, "created flow context");
        flow_id
    }

    /// Number of flows classified so far.
    pub fn flow_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).key_to_flow.len()
    }

    pub fn default_policy_id(&self) -> PolicyId {
        self.default_policy_id
    }

    /// Handle to the table this classifier fills.
    pub fn flow_table(&self) -> Arc<Mutex<FlowTable>> {
        Arc::clone(&self.flow_table)
    }
}

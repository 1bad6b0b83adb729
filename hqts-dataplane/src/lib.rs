//! Flow identification for the packet pipeline.
//!
//! A [`FiveTuple`] identifies a flow on the wire; the [`FlowClassifier`] maps
//! it to a stable [`FlowId`](hqts_common::FlowId) and materializes a
//! [`FlowContext`] in the shared [`FlowTable`] on first sighting. The
//! classifier is the one thread-safe component of the core: producers may
//! classify concurrently before packets funnel into a pipeline instance.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod classifier;
mod flow;
mod ident;

pub use classifier::{ClassifierError, FlowClassifier};
pub use flow::{DropPolicy, FlowContext, FlowStats, FlowTable, SlaStatus};
pub use ident::FiveTuple;

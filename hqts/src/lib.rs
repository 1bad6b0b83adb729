//! Hierarchical QoS traffic shaper.
//!
//! The pipeline classifies packets into flows, polices them against two-rate
//! three-color token buckets, and hands conforming traffic to a
//! work-conserving scheduler:
//!
//! ```text
//! FiveTuple + length -> classify -> police/mark -> enqueue -> ... -> dequeue
//! ```
//!
//! The pieces compose from the sibling crates and are re-exported here:
//! policies and token buckets from `hqts-policy`, AQM queues and the
//! scheduler family from `hqts-scheduler`, and flow identification from
//! `hqts-dataplane`. This crate adds the [`TrafficShaper`] (the
//! policer/marker) and the [`PacketPipeline`] orchestrator.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub use hqts_common::*;
pub use hqts_dataplane::*;
pub use hqts_policy::*;
pub use hqts_scheduler::*;

mod pipeline;
mod shaper;

pub use pipeline::{PacketPipeline, PipelineError};
pub use shaper::{ShaperError, TrafficShaper};

use std::collections::VecDeque;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::trace;

use crate::{ConfigError, PacketDescriptor, SchedulerError};

/// Gentle-RED configuration. Validated once, immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RedAqmParameters {
    min_threshold_bytes: u32,
    max_threshold_bytes: u32,
    max_probability: f64,
    ewma_weight: f64,
    queue_capacity_bytes: u32,
}

impl RedAqmParameters {
    /// Validates `0 < min < max <= capacity`, `max_probability` in `(0, 1]`,
    /// and `ewma_weight` in `(0, 1]`.
    pub fn new(
        min_threshold_bytes: u32,
        max_threshold_bytes: u32,
        max_probability: f64,
        ewma_weight: f64,
        queue_capacity_bytes: u32,
    ) -> Result<Self, ConfigError> {
        if min_threshold_bytes == 0
            || min_threshold_bytes >= max_threshold_bytes
            || max_threshold_bytes > queue_capacity_bytes
        {
            return Err(ConfigError::BadThresholds {
                min: min_threshold_bytes,
                max: max_threshold_bytes,
                capacity: queue_capacity_bytes,
            });
        }
        if !(max_probability > 0.0 && max_probability <= 1.0) {
            return Err(ConfigError::BadProbability(max_probability));
        }
        if !(ewma_weight > 0.0 && ewma_weight <= 1.0) {
            return Err(ConfigError::BadEwmaWeight(ewma_weight));
        }
        Ok(Self {
            min_threshold_bytes,
            max_threshold_bytes,
            max_probability,
            ewma_weight,
            queue_capacity_bytes,
        })
    }

    pub fn min_threshold_bytes(&self) -> u32 {
        self.min_threshold_bytes
    }

    pub fn max_threshold_bytes(&self) -> u32 {
        self.max_threshold_bytes
    }

    pub fn max_probability(&self) -> f64 {
        self.max_probability
    }

    pub fn ewma_weight(&self) -> f64 {
        self.ewma_weight
    }

    pub fn queue_capacity_bytes(&self) -> u32 {
        self.queue_capacity_bytes
    }
}

/// Outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Admitted,
    /// The packet would have pushed the buffer past its physical capacity.
    TailDropped,
    /// Probabilistic early drop by gentle RED.
    RedDropped,
}

impl EnqueueOutcome {
    pub fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// FIFO packet buffer with gentle-RED early dropping.
///
/// The average queue size is an EWMA sampled from the instantaneous byte
/// count: on enqueue before the arriving packet is counted (the arriving
/// packet's view of the queue), and again after each departure so the
/// estimate stays fresh while the queue drains. Physical-capacity drops
/// bypass RED accounting entirely; they are not probabilistic events.
#[derive(Debug)]
pub struct RedAqmQueue {
    buffer: VecDeque<PacketDescriptor>,
    params: RedAqmParameters,
    average_queue_size_bytes: f64,
    current_total_bytes: u32,
    packets_since_last_drop: u32,
    rng: StdRng,
}

impl RedAqmQueue {
    pub fn new(params: RedAqmParameters) -> Self {
        Self::with_rng(params, StdRng::from_entropy())
    }

    /// Queue with a deterministic drop sequence, for tests.
    pub fn with_seed(params: RedAqmParameters, seed: u64) -> Self {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: RedAqmParameters, rng: StdRng) -> Self {
        Self {
            buffer: VecDeque::new(),
            params,
            average_queue_size_bytes: 0.0,
            current_total_bytes: 0,
            packets_since_last_drop: 0,
            rng,
        }
    }

    fn update_average(&mut self) {
        let w = self.params.ewma_weight;
        self.average_queue_size_bytes =
            (1.0 - w) * self.average_queue_size_bytes + w * f64::from(self.current_total_bytes);
    }

    /// Base drop probability from the current average: zero below the min
    /// threshold, `max_probability` at or above the max threshold, linear in
    /// between.
    fn drop_probability(&self) -> f64 {
        let avg = self.average_queue_size_bytes;
        let min = f64::from(self.params.min_threshold_bytes);
        let max = f64::from(self.params.max_threshold_bytes);
        if avg < min {
            0.0
        } else if avg >= max {
            self.params.max_probability
        } else {
            (avg - min) / (max - min) * self.params.max_probability
        }
    }

    /// Admits or drops one packet.
    pub fn enqueue(&mut self, packet: PacketDescriptor) -> EnqueueOutcome {
        self.update_average();

        let projected =
            u64::from(self.current_total_bytes) + u64::from(packet.packet_length_bytes);
        if projected > u64::from(self.params.queue_capacity_bytes) {
            trace!(bytes = self.current_total_bytes, "tail drop: queue at physical capacity");
            return EnqueueOutcome::TailDropped;
        }

        let p_b = self.drop_probability();
        if p_b > 0.0 {
            // Gentle amplification: every admitted packet since the last drop
            // raises the effective probability.
            let denominator = 1.0 - f64::from(self.packets_since_last_drop) * p_b;
            let dp = if denominator <= 1e-9 { 1.0 } else { (p_b / denominator).min(1.0) };
            if self.rng.gen::<f64>() < dp {
                self.packets_since_last_drop = 0;
                trace!(avg = self.average_queue_size_bytes, probability = dp, "red early drop");
                return EnqueueOutcome::RedDropped;
            }
        }

        self.packets_since_last_drop += 1;
        self.current_total_bytes += packet.packet_length_bytes;
        self.buffer.push_back(packet);
        EnqueueOutcome::Admitted
    }

    pub fn dequeue(&mut self) -> Result<PacketDescriptor, SchedulerError> {
        let packet = self.buffer.pop_front().ok_or(SchedulerError::Empty)?;
        self.current_total_bytes -= packet.packet_length_bytes;
        self.update_average();
        Ok(packet)
    }

    /// The packet that `dequeue` would return next.
    pub fn front(&self) -> Option<&PacketDescriptor> {
        self.buffer.front()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn byte_size(&self) -> u32 {
        self.current_total_bytes
    }

    pub fn average_queue_size_bytes(&self) -> f64 {
        self.average_queue_size_bytes
    }

    pub fn params(&self) -> &RedAqmParameters {
        &self.params
    }
}

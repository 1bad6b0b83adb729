use hqts_common::QueueId;
use rustc_hash::FxHashMap;

use crate::{
    ConfigError, EnqueueOutcome, PacketDescriptor, RedAqmParameters, RedAqmQueue, Scheduler,
    SchedulerError,
};

/// Configuration for one WRR queue.
#[derive(Debug, Clone)]
pub struct WrrQueueConfig {
    pub id: QueueId,
    pub weight: u32,
    pub aqm_params: RedAqmParameters,
}

impl WrrQueueConfig {
    pub fn new(id: QueueId, weight: u32, aqm_params: RedAqmParameters) -> Self {
        Self { id, weight, aqm_params }
    }
}

#[derive(Debug)]
struct WrrQueue {
    queue: RedAqmQueue,
    weight: u32,
    deficit: i64,
}

/// Packet-level Weighted Round Robin.
///
/// Each queue carries an integer deficit in packet units, initialized to its
/// weight. A dequeue serves one packet from the next queue (in round-robin
/// order) that is non-empty and still has deficit; when a full scan finds no
/// such queue, every deficit is replenished by its weight and the scan
/// repeats. `packet.priority` is interpreted as the target [`QueueId`].
#[derive(Debug)]
pub struct WrrScheduler {
    queues: Vec<WrrQueue>,
    index_of: FxHashMap<QueueId, usize>,
    cursor: usize,
    total_packets: usize,
}

impl WrrScheduler {
    pub fn new(configs: Vec<WrrQueueConfig>) -> Result<Self, ConfigError> {
        if configs.is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut queues = Vec::with_capacity(configs.len());
        let mut index_of = FxHashMap::default();
        for (index, config) in configs.into_iter().enumerate() {
            if config.weight == 0 {
                return Err(ConfigError::ZeroWeight(config.id));
            }
            if index_of.insert(config.id, index).is_some() {
                return Err(ConfigError::DuplicateQueue(config.id));
            }
            queues.push(WrrQueue {
                queue: RedAqmQueue::new(config.aqm_params),
                weight: config.weight,
                deficit: i64::from(config.weight),
            });
        }
        Ok(Self { queues, index_of, cursor: 0, total_packets: 0 })
    }

    pub fn num_queues(&self) -> usize {
        self.queues.len()
    }

    /// Packets pending in one queue.
    pub fn queue_len(&self, id: QueueId) -> Result<usize, SchedulerError> {
        let index = *self.index_of.get(&id).ok_or(SchedulerError::UnknownQueue(id))?;
        Ok(self.queues[index].queue.len())
    }

    fn replenish_all(&mut self) {
        for queue in &mut self.queues {
            queue.deficit += i64::from(queue.weight);
        }
    }
}

impl Scheduler for WrrScheduler {
    fn enqueue(&mut self, packet: PacketDescriptor) -> Result<(), SchedulerError> {
        let id = QueueId::from(packet.priority);
        let Some(&index) = self.index_of.get(&id) else {
            return Err(SchedulerError::UnknownQueue(id));
        };
        if self.queues[index].queue.enqueue(packet) == EnqueueOutcome::Admitted {
            self.total_packets += 1;
        }
        Ok(())
    }

    fn dequeue(&mut self) -> Result<PacketDescriptor, SchedulerError> {
        if self.total_packets == 0 {
            return Err(SchedulerError::Empty);
        }
        let num_queues = self.queues.len();
        let mut replenishes = 0;
        loop {
            for step in 0..num_queues {
                let index = (self.cursor + step) % num_queues;
                let entry = &mut self.queues[index];
                if !entry.queue.is_empty() && entry.deficit > 0 {
                    let packet = entry.queue.dequeue()?;
                    entry.deficit -= 1;
                    self.total_packets -= 1;
                    self.cursor = (index + 1) % num_queues;
                    return Ok(packet);
                }
            }
            // Exhausted deficits everywhere; top every queue up by its weight
            // and rescan. Two fruitless replenish cycles cannot happen while
            // packets are pending.
            if replenishes == 2 {
                return Err(SchedulerError::Inconsistent(
                    "no serviceable queue after replenishing deficits",
                ));
            }
            self.replenish_all();
            replenishes += 1;
        }
    }

    fn is_empty(&self) -> bool {
        self.total_packets == 0
    }

    fn len(&self) -> usize {
        self.total_packets
    }
}

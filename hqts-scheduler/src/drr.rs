use hqts_common::QueueId;
use rustc_hash::FxHashMap;

use crate::{
    ConfigError, EnqueueOutcome, PacketDescriptor, RedAqmParameters, RedAqmQueue, Scheduler,
    SchedulerError,
};

/// Configuration for one DRR queue.
#[derive(Debug, Clone)]
pub struct DrrQueueConfig {
    pub id: QueueId,
    pub quantum_bytes: u32,
    pub aqm_params: RedAqmParameters,
}

impl DrrQueueConfig {
    pub fn new(id: QueueId, quantum_bytes: u32, aqm_params: RedAqmParameters) -> Self {
        Self { id, quantum_bytes, aqm_params }
    }
}

#[derive(Debug)]
struct DrrQueue {
    queue: RedAqmQueue,
    quantum_bytes: u32,
    deficit: i64,
}

/// Byte-accurate Deficit Round Robin.
///
/// Visiting a non-empty queue credits it with its quantum; the head packet is
/// sent when the accumulated deficit covers its length, and the unspent
/// credit carries to the queue's next visit. One packet per dequeue call, the
/// cursor advancing after each send so fairness holds across calls.
/// `packet.priority` is interpreted as the target [`QueueId`].
#[derive(Debug)]
pub struct DrrScheduler {
    queues: Vec<DrrQueue>,
    index_of: FxHashMap<QueueId, usize>,
    cursor: usize,
    total_packets: usize,
}

impl DrrScheduler {
    pub fn new(configs: Vec<DrrQueueConfig>) -> Result<Self, ConfigError> {
        if configs.is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut queues = Vec::with_capacity(configs.len());
        let mut index_of = FxHashMap::default();
        for (index, config) in configs.into_iter().enumerate() {
            if config.quantum_bytes == 0 {
                return Err(ConfigError::ZeroQuantum(config.id));
            }
            if index_of.insert(config.id, index).is_some() {
                return Err(ConfigError::DuplicateQueue(config.id));
            }
            queues.push(DrrQueue {
                queue: RedAqmQueue::new(config.aqm_params),
                quantum_bytes: config.quantum_bytes,
                deficit: 0,
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
}

impl Scheduler for DrrScheduler {
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
        let mut attempts = 0;
        while attempts < 2 * num_queues {
            let index = self.cursor;
            let entry = &mut self.queues[index];
            if !entry.queue.is_empty() {
                entry.deficit += i64::from(entry.quantum_bytes);
                if let Some(front) = entry.queue.front() {
                    let length = i64::from(front.packet_length_bytes);
                    if length <= entry.deficit {
                        let packet = entry.queue.dequeue()?;
                        entry.deficit -= length;
                        self.total_packets -= 1;
                        self.cursor = (index + 1) % num_queues;
                        return Ok(packet);
                    }
                }
                // Head packet still larger than the credit; the credit carries.
            }
            self.cursor = (index + 1) % num_queues;
            attempts += 1;
        }
        // Every queue was visited twice without a send while packets are
        // pending. Deficits keep accumulating across calls, so a later call
        // can still succeed, but a single call gives up here.
        Err(SchedulerError::Inconsistent("no packet fit within the accumulated deficits"))
    }

    fn is_empty(&self) -> bool {
        self.total_packets == 0
    }

    fn len(&self) -> usize {
        self.total_packets
    }
}

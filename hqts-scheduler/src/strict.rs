use crate::{
    ConfigError, EnqueueOutcome, PacketDescriptor, RedAqmParameters, RedAqmQueue, Scheduler,
    SchedulerError,
};

/// Strict-priority scheduler.
///
/// One AQM queue per priority level, `packet.priority` selecting the level.
/// Dequeue always serves the highest-indexed non-empty level; within a level
/// the order is FIFO over admitted packets.
#[derive(Debug)]
pub struct StrictPriorityScheduler {
    levels: Vec<RedAqmQueue>,
    total_packets: usize,
}

impl StrictPriorityScheduler {
    /// One entry in `level_params` per priority level; the list index is the
    /// level number.
    pub fn new(level_params: Vec<RedAqmParameters>) -> Result<Self, ConfigError> {
        if level_params.is_empty() {
            return Err(ConfigError::Empty);
        }
        Ok(Self {
            levels: level_params.into_iter().map(RedAqmQueue::new).collect(),
            total_packets: 0,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Packets pending at one level.
    pub fn level_len(&self, level: u8) -> Result<usize, SchedulerError> {
        self.levels.get(usize::from(level)).map(RedAqmQueue::len).ok_or(
            SchedulerError::PriorityOutOfRange { priority: level, levels: self.levels.len() },
        )
    }
}

impl Scheduler for StrictPriorityScheduler {
    fn enqueue(&mut self, packet: PacketDescriptor) -> Result<(), SchedulerError> {
        let level = usize::from(packet.priority);
        let levels = self.levels.len();
        let Some(queue) = self.levels.get_mut(level) else {
            return Err(SchedulerError::PriorityOutOfRange { priority: packet.priority, levels });
        };
        if queue.enqueue(packet) == EnqueueOutcome::Admitted {
            self.total_packets += 1;
        }
        Ok(())
    }

    fn dequeue(&mut self) -> Result<PacketDescriptor, SchedulerError> {
        if self.total_packets == 0 {
            return Err(SchedulerError::Empty);
        }
        for queue in self.levels.iter_mut().rev() {
            if !queue.is_empty() {
                let packet = queue.dequeue()?;
                self.total_packets -= 1;
                return Ok(packet);
            }
        }
        Err(SchedulerError::Inconsistent("packets pending but every priority level is empty"))
    }

    fn is_empty(&self) -> bool {
        self.total_packets == 0
    }

    fn len(&self) -> usize {
        self.total_packets
    }
}

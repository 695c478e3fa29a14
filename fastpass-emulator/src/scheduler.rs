//! Dequeue policies (§4.G): strict priority or round-robin across a
//! port's per-priority FIFOs. Same trait+enum dispatch shape as
//! [`crate::queue_manager`].

use std::collections::VecDeque;

pub const NUM_PRIORITIES: usize = 5;

pub trait SchedulerPolicy: Send {
    /// Pulls one packet id from `queues`, or `None` if all are empty.
    fn pull(&mut self, queues: &mut [VecDeque<u64>; NUM_PRIORITIES]) -> Option<u64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StrictPriority;

impl SchedulerPolicy for StrictPriority {
    fn pull(&mut self, queues: &mut [VecDeque<u64>; NUM_PRIORITIES]) -> Option<u64> {
        queues.iter_mut().find_map(|q| q.pop_front())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin {
    next: usize,
}

impl SchedulerPolicy for RoundRobin {
    fn pull(&mut self, queues: &mut [VecDeque<u64>; NUM_PRIORITIES]) -> Option<u64> {
        for offset in 0..NUM_PRIORITIES {
            let idx = (self.next + offset) % NUM_PRIORITIES;
            if let Some(id) = queues[idx].pop_front() {
                self.next = (idx + 1) % NUM_PRIORITIES;
                return Some(id);
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub enum Scheduler {
    StrictPriority(StrictPriority),
    RoundRobin(RoundRobin),
}

impl SchedulerPolicy for Scheduler {
    fn pull(&mut self, queues: &mut [VecDeque<u64>; NUM_PRIORITIES]) -> Option<u64> {
        match self {
            Scheduler::StrictPriority(s) => s.pull(queues),
            Scheduler::RoundRobin(s) => s.pull(queues),
        }
    }
}

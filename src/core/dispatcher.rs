//! Per-worker queues and the routing table that picks a worker for each job.
//!
//! A worker owns three bounded rings, one per priority band. When a band's
//! ring is full, further jobs for that band spill into an unbounded overflow
//! list; once the overflow list is non-empty, every new job for the band goes
//! there too, so submission order inside a band is never broken. The ring is
//! refilled from overflow when it runs empty.

use std::collections::VecDeque;

use super::job::{JobHandle, JobPriority, JobType, JobTypeMask};
use super::ring::RingQueue;

pub(crate) struct WorkerQueues {
    bands: [RingQueue<JobHandle>; JobPriority::BANDS],
    overflow: [VecDeque<JobHandle>; JobPriority::BANDS],
}

impl WorkerQueues {
    pub fn new(capacity: usize) -> Self {
        Self {
            bands: std::array::from_fn(|_| RingQueue::with_capacity(capacity)),
            overflow: std::array::from_fn(|_| VecDeque::new()),
        }
    }

    /// Queue `handle` in its band. Returns `true` if it went to overflow.
    pub fn push(&mut self, handle: JobHandle, priority: JobPriority) -> bool {
        let band = priority.band();
        if self.overflow[band].is_empty() {
            match self.bands[band].push(handle) {
                Ok(()) => return false,
                Err(handle) => self.overflow[band].push_back(handle),
            }
        } else {
            self.overflow[band].push_back(handle);
        }
        true
    }

    /// Pop from the highest non-empty band. HIGH drains fully before NORMAL,
    /// NORMAL before LOW.
    pub fn pop_next(&mut self) -> Option<JobHandle> {
        (0..JobPriority::BANDS).find_map(|band| self.pop_band(band))
    }

    fn pop_band(&mut self, band: usize) -> Option<JobHandle> {
        if self.bands[band].is_empty() {
            self.splice_overflow(band);
        }
        self.bands[band].pop()
    }

    fn splice_overflow(&mut self, band: usize) {
        let ring = &mut self.bands[band];
        let overflow = &mut self.overflow[band];
        while !ring.is_full() {
            let Some(handle) = overflow.pop_front() else {
                break;
            };
            if let Err(handle) = ring.push(handle) {
                overflow.push_front(handle);
                break;
            }
        }
    }

    /// Jobs queued across every band, ring and overflow.
    pub fn len(&self) -> usize {
        self.bands.iter().map(RingQueue::len).sum::<usize>() + self.overflow_len()
    }

    pub fn overflow_len(&self) -> usize {
        self.overflow.iter().map(VecDeque::len).sum()
    }

    /// Empty every band, highest first.
    pub fn drain_all(&mut self) -> Vec<JobHandle> {
        let mut drained = Vec::with_capacity(self.len());
        while let Some(handle) = self.pop_next() {
            drained.push(handle);
        }
        drained
    }
}

/// Which workers admit each job type, with a round-robin cursor per type.
#[derive(Debug)]
pub(crate) struct Routing {
    admissible: [Vec<usize>; JobType::ALL.len()],
    cursors: [usize; JobType::ALL.len()],
}

impl Routing {
    pub fn from_masks(masks: &[JobTypeMask]) -> Self {
        let admissible = std::array::from_fn(|index| {
            let job_type = JobType::ALL[index];
            masks
                .iter()
                .enumerate()
                .filter(|(_, mask)| mask.admits(job_type))
                .map(|(worker, _)| worker)
                .collect()
        });
        Self {
            admissible,
            cursors: [0; JobType::ALL.len()],
        }
    }

    /// Next worker for `job_type`, rotating among the admissible ones.
    pub fn select(&mut self, job_type: JobType) -> Option<usize> {
        let index = job_type.index();
        let workers = &self.admissible[index];
        if workers.is_empty() {
            return None;
        }
        let cursor = &mut self.cursors[index];
        let worker = workers[*cursor % workers.len()];
        *cursor = (*cursor + 1) % workers.len();
        Some(worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: u16) -> JobHandle {
        JobHandle { id, generation: 0 }
    }

    #[test]
    fn test_high_band_first() {
        let mut queues = WorkerQueues::new(8);
        queues.push(handle(1), JobPriority::Low);
        queues.push(handle(2), JobPriority::Normal);
        queues.push(handle(3), JobPriority::High);
        queues.push(handle(4), JobPriority::High);

        let order: Vec<u16> = queues.drain_all().into_iter().map(|h| h.id).collect();
        assert_eq!(order, vec![3, 4, 2, 1]);
    }

    #[test]
    fn test_overflow_preserves_fifo() {
        let mut queues = WorkerQueues::new(2);
        let spilled: Vec<bool> = (0..6)
            .map(|id| queues.push(handle(id), JobPriority::Normal))
            .collect();
        assert_eq!(spilled, vec![false, false, true, true, true, true]);
        assert_eq!(queues.overflow_len(), 4);

        // Free a ring slot; a new job must still queue behind the overflow.
        assert_eq!(queues.pop_next().unwrap().id, 0);
        assert!(queues.push(handle(6), JobPriority::Normal));

        let rest: Vec<u16> = queues.drain_all().into_iter().map(|h| h.id).collect();
        assert_eq!(rest, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(queues.len(), 0);
    }

    #[test]
    fn test_routing_round_robin_per_type() {
        let masks = [
            JobTypeMask::GPU_RESOURCE,
            JobTypeMask::RESOURCE_LOAD,
            JobTypeMask::GENERAL,
            JobTypeMask::GENERAL,
            JobTypeMask::GENERAL,
        ];
        let mut routing = Routing::from_masks(&masks);

        let general: Vec<usize> = (0..6).filter_map(|_| routing.select(JobType::General)).collect();
        assert_eq!(general, vec![2, 3, 4, 2, 3, 4]);
        assert_eq!(routing.select(JobType::GpuResource), Some(0));
        assert_eq!(routing.select(JobType::ResourceLoad), Some(1));
        assert_eq!(routing.select(JobType::ResourceLoad), Some(1));
    }

    #[test]
    fn test_routing_missing_type() {
        let mut routing = Routing::from_masks(&[JobTypeMask::GENERAL]);
        assert!(routing.select(JobType::GpuResource).is_none());
        assert_eq!(routing.select(JobType::General), Some(0));
        assert_eq!(routing.select(JobType::General), Some(0));
    }
}

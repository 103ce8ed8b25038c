//! Bounded task queue shared by the sweep producer and the scan sessions.
//!
//! The queue is tiny (capacity 1 by default): the producer
//! blocks on [`TaskQueue::push`] whenever every session is busy, so coverage
//! generation runs at exactly the pace sessions consume it and memory stays
//! bounded no matter how large the configured areas are.
//!
//! Shutdown travels through the same channel: after the producer stops, one
//! [`ScanTask::Stop`] per session is pushed so every consumer leaves its pull
//! loop without relying on timing.
//!
//! # Example
//!
//! ```
//! use cellsweep::coord::{Cell, LatLng};
//! use cellsweep::queue::{ScanTask, TaskQueue};
//!
//! let queue = TaskQueue::new(1);
//! queue.push(ScanTask::Cell(Cell::containing(LatLng::new(1.0, 2.0), 16)));
//! assert!(matches!(queue.pop(), ScanTask::Cell(_)));
//! ```

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::warn;

use crate::coord::Cell;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// A unit of work for a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTask {
    /// Scan the given cell.
    Cell(Cell),
    /// Leave the pull loop.
    Stop,
}

/// Bounded, blocking multi-consumer FIFO over a `crossbeam_channel`.
///
/// Each pushed task is delivered to exactly one caller of [`pop`](Self::pop).
/// The queue owns both channel ends, so neither side can disconnect while
/// it is alive.
#[derive(Debug)]
pub struct TaskQueue {
    sender: Sender<ScanTask>,
    receiver: Receiver<ScanTask>,
    capacity: usize,
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` tasks (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Appends a task, blocking while the queue is full.
    pub fn push(&self, task: ScanTask) {
        // Only fails once every receiver is gone, and this queue holds one
        if self.sender.send(task).is_err() {
            warn!("Task queue disconnected, dropping task");
        }
    }

    /// Removes the oldest task, blocking while the queue is empty.
    ///
    /// A disconnected channel reads as [`ScanTask::Stop`].
    pub fn pop(&self) -> ScanTask {
        self.receiver.recv().unwrap_or(ScanTask::Stop)
    }

    /// Removes the oldest task if one is available.
    pub fn try_pop(&self) -> Option<ScanTask> {
        match self.receiver.try_recv() {
            Ok(task) => Some(task),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(ScanTask::Stop),
        }
    }

    /// Number of tasks currently waiting.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true if no task is waiting.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Maximum number of waiting tasks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::LatLng;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn cell(n: u32) -> Cell {
        Cell {
            row: n,
            col: n,
            level: 16,
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new(3);
        queue.push(ScanTask::Cell(cell(1)));
        queue.push(ScanTask::Cell(cell(2)));
        queue.push(ScanTask::Stop);

        assert_eq!(queue.pop(), ScanTask::Cell(cell(1)));
        assert_eq!(queue.pop(), ScanTask::Cell(cell(2)));
        assert_eq!(queue.pop(), ScanTask::Stop);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let queue = TaskQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_try_pop_on_empty_queue() {
        let queue = TaskQueue::default();
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_push_blocks_while_full() {
        let queue = Arc::new(TaskQueue::new(1));
        queue.push(ScanTask::Cell(cell(1)));
        assert_eq!(queue.len(), 1);

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(ScanTask::Cell(cell(2))))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());

        assert_eq!(queue.pop(), ScanTask::Cell(cell(1)));
        producer.join().unwrap();
        assert_eq!(queue.pop(), ScanTask::Cell(cell(2)));
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(TaskQueue::new(1));

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(50));
        let task = ScanTask::Cell(Cell::containing(LatLng::new(10.0, 10.0), 12));
        queue.push(task);

        assert_eq!(consumer.join().unwrap(), task);
    }

    #[test]
    fn test_each_task_delivered_once() {
        let queue = Arc::new(TaskQueue::new(1));
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let ScanTask::Cell(cell) = queue.pop() {
                        seen.push(cell);
                    }
                    seen
                })
            })
            .collect();

        for n in 0..200 {
            queue.push(ScanTask::Cell(cell(n)));
        }
        for _ in 0..4 {
            queue.push(ScanTask::Stop);
        }

        let mut all: Vec<Cell> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort();
        let mut expected: Vec<Cell> = (0..200).map(cell).collect();
        expected.sort();
        assert_eq!(all, expected);
    }
}

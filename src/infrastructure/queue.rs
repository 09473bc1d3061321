use crate::domain::job::{Job, LogicalTime};
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::futures::Notified;
use tokio::sync::{Mutex, Notify};

/// Rejection returned by [`BoundedJobQueue::enqueue`] when the queue is at
/// capacity. The job is handed back untouched so the caller decides what to do
/// with it.
#[derive(Error, Debug)]
#[error("queue is full (capacity {capacity})")]
pub struct QueueFull {
    pub capacity: usize,
    pub job: Job,
}

/// Point-in-time view of the queue, taken under a single lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub queued: usize,
    /// Queued jobs eligible at the time of the snapshot.
    pub ready: usize,
    /// Jobs handed out by `dequeue_ready` and not yet acknowledged.
    pub checked_out: usize,
}

impl QueueSnapshot {
    /// Nothing queued and nothing being executed.
    pub fn is_drained(&self) -> bool {
        self.queued == 0 && self.checked_out == 0
    }

    /// Nothing can make progress until time advances or new work arrives.
    pub fn is_idle(&self) -> bool {
        self.ready == 0 && self.checked_out == 0
    }
}

struct QueueState {
    jobs: VecDeque<Job>,
    checked_out: usize,
}

/// Fixed-capacity FIFO of pending and retry-scheduled jobs.
///
/// Jobs are kept in enqueue order. `dequeue_ready` takes the oldest job that
/// is eligible at the given time and leaves the not-yet-eligible ones in
/// place. A dequeued job counts as checked out until the consumer calls
/// [`BoundedJobQueue::acknowledge`], so a snapshot never loses sight of work
/// in transit between the queue and a worker.
pub struct BoundedJobQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    enqueued: Notify,
    acknowledged: Notify,
}

impl BoundedJobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                jobs: VecDeque::with_capacity(capacity),
                checked_out: 0,
            }),
            enqueued: Notify::new(),
            acknowledged: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn enqueue(&self, job: Job) -> Result<(), QueueFull> {
        let mut state = self.state.lock().await;
        if state.jobs.len() >= self.capacity {
            return Err(QueueFull {
                capacity: self.capacity,
                job,
            });
        }
        state.jobs.push_back(job);
        drop(state);
        self.enqueued.notify_waiters();
        Ok(())
    }

    /// Removes and returns the oldest job eligible at `now`, if any. Never waits.
    pub async fn dequeue_ready(&self, now: LogicalTime) -> Option<Job> {
        let mut state = self.state.lock().await;
        let index = state.jobs.iter().position(|job| job.is_eligible(now))?;
        let job = state.jobs.remove(index)?;
        state.checked_out += 1;
        Some(job)
    }

    /// Marks one checked-out job as fully handled.
    ///
    /// Any follow-up job (a retry) must be enqueued before acknowledging.
    pub async fn acknowledge(&self) {
        let mut state = self.state.lock().await;
        state.checked_out = state.checked_out.saturating_sub(1);
        drop(state);
        self.acknowledged.notify_waiters();
    }

    pub async fn snapshot(&self, now: LogicalTime) -> QueueSnapshot {
        let state = self.state.lock().await;
        QueueSnapshot {
            queued: state.jobs.len(),
            ready: state.jobs.iter().filter(|job| job.is_eligible(now)).count(),
            checked_out: state.checked_out,
        }
    }

    pub async fn size(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.jobs.is_empty()
    }

    /// Earliest eligibility time among queued jobs.
    pub async fn next_eligible_time(&self) -> Option<LogicalTime> {
        let state = self.state.lock().await;
        state.jobs.iter().map(|job| job.next_eligible_time).min()
    }

    /// Future that completes on the next successful enqueue.
    ///
    /// Call `enable()` on it before inspecting the queue to avoid missing a
    /// wake-up that races with the inspection.
    pub fn notified(&self) -> Notified<'_> {
        self.enqueued.notified()
    }

    /// Future that completes on the next acknowledgement.
    pub fn acknowledged(&self) -> Notified<'_> {
        self.acknowledged.notified()
    }
}

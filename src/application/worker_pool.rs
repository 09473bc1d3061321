use super::context::ProcessingContext;
use super::retry::RetryScheduler;
use crate::domain::job::{Job, LogicalTime};
use crate::domain::order::{OrderId, OrderStatus};
use crate::domain::payment::{DeadLetterEntry, GatewayError, Receipt};
use crate::domain::ports::Reservation;
use crate::error::OrderError;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Fixed-size pool of workers that execute charge jobs.
///
/// Each worker pulls the oldest eligible job from the shared queue, charges it
/// through the gateway under the protection of the idempotency store, and
/// routes the outcome to the order store, back into the queue as a retry, or
/// to the dead letter queue.
///
/// Workers park while nothing is eligible and wake when a job is enqueued, the
/// logical clock advances, or the pool is stopped.
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    ctx: ProcessingContext,
    retry: RetryScheduler,
    /// Retries rejected by a full queue, re-offered on every worker pass.
    overflow: Mutex<VecDeque<Job>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn new(ctx: ProcessingContext) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                retry: RetryScheduler::from_config(&ctx.config),
                overflow: Mutex::new(VecDeque::new()),
                shutdown,
                ctx,
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Launches `worker_count` workers. Does nothing if the pool is running.
    pub async fn start(&self, worker_count: usize) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            warn!("Worker pool already running");
            return;
        }

        self.shared.shutdown.send_replace(false);
        for worker in 0..worker_count {
            let shared = self.shared.clone();
            handles.push(tokio::spawn(async move { shared.run(worker).await }));
        }
        info!(
            workers = worker_count,
            capacity = self.shared.ctx.queue.capacity(),
            max_retries = self.shared.retry.max_retries(),
            "Worker pool started"
        );
    }

    /// Stops the workers once their current job is done.
    ///
    /// With `drain`, first waits until every queued job, including those still
    /// backing off, has been executed. Time must keep advancing for that to
    /// happen. Without `drain`, queued jobs stay in place for the next
    /// [`WorkerPool::start`].
    pub async fn stop(&self, drain: bool) {
        if drain {
            self.wait_drained().await;
        }

        self.shared.shutdown.send_replace(true);
        let handles = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }
        info!(drained = drain, "Worker pool stopped");
    }

    /// Waits until no job is executing, no queued job is eligible at the
    /// current logical time, and no held retry could enter the queue.
    ///
    /// Only meaningful while the pool is running: with no workers, eligible
    /// jobs are never picked up.
    pub async fn wait_idle(&self) {
        let queue = &self.shared.ctx.queue;
        loop {
            let acknowledged = queue.acknowledged();
            let enqueued = queue.notified();
            tokio::pin!(acknowledged, enqueued);
            acknowledged.as_mut().enable();
            enqueued.as_mut().enable();

            if self.shared.is_idle().await {
                return;
            }
            tokio::select! {
                _ = acknowledged => {}
                _ = enqueued => {}
            }
        }
    }

    /// Waits until the queue, the overflow buffer and every worker are empty.
    pub async fn wait_drained(&self) {
        let queue = &self.shared.ctx.queue;
        loop {
            let acknowledged = queue.acknowledged();
            tokio::pin!(acknowledged);
            acknowledged.as_mut().enable();

            if self.shared.is_drained().await {
                return;
            }
            acknowledged.await;
        }
    }

    pub async fn is_drained(&self) -> bool {
        self.shared.is_drained().await
    }

    /// Number of retries waiting for queue capacity.
    pub async fn overflow_len(&self) -> usize {
        self.shared.overflow.lock().await.len()
    }
}

impl Shared {
    async fn run(&self, worker: usize) {
        let mut clock = self.ctx.clock.subscribe();
        let mut shutdown = self.shutdown.subscribe();
        debug!(worker, "Worker started");

        while let Some(job) = self.next_job(&mut clock, &mut shutdown).await {
            self.execute(job, worker).await;
            // The slot this job freed goes to held retries before anyone
            // observes the acknowledgement.
            self.flush_overflow().await;
            self.ctx.queue.acknowledge().await;
        }

        debug!(worker, "Worker stopped");
    }

    /// Parks until an eligible job can be taken or shutdown is requested.
    async fn next_job(
        &self,
        clock: &mut watch::Receiver<LogicalTime>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Job> {
        loop {
            if *shutdown.borrow_and_update() {
                return None;
            }
            clock.borrow_and_update();
            let enqueued = self.ctx.queue.notified();
            tokio::pin!(enqueued);
            enqueued.as_mut().enable();

            self.flush_overflow().await;
            if let Some(job) = self.ctx.queue.dequeue_ready(self.ctx.clock.now()).await {
                return Some(job);
            }

            tokio::select! {
                _ = &mut enqueued => {}
                changed = clock.changed() => {
                    if changed.is_err() {
                        // Clock is gone; only new jobs or shutdown can wake us.
                        tokio::select! {
                            _ = &mut enqueued => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
    }

    /// Runs the per-job protocol. Never fails: every outcome ends up in the
    /// order store, the queue or the dead letter queue.
    async fn execute(&self, job: Job, worker: usize) {
        let order_id = job.order_id().clone();

        match self.ctx.idempotency.try_reserve(&order_id).await {
            Reservation::Committed => {
                debug!(worker, %order_id, "Order already charged, skipping gateway");
                self.settle(&order_id, OrderStatus::Paid).await;
                return;
            }
            Reservation::InFlight => {
                debug!(worker, %order_id, "Order held by another worker, dropping duplicate");
                return;
            }
            Reservation::Acquired => {}
        }

        let attempt = job.attempt + 1;
        debug!(worker, %order_id, attempt, "Charging order");
        match self.ctx.gateway.charge(&job.payload).await {
            Ok(receipt) => self.on_charged(job, receipt, attempt, worker).await,
            Err(err) => {
                self.ctx.idempotency.release(&order_id).await;
                match err {
                    GatewayError::Transient(_) => self.on_transient(job, err, attempt, worker).await,
                    GatewayError::Permanent(_) => {
                        warn!(worker, %order_id, attempt, error = %err, "Permanent charge failure");
                        self.dead_letter(job, attempt, err.to_string()).await;
                    }
                }
            }
        }
    }

    async fn on_charged(&self, job: Job, receipt: Receipt, attempt: u32, worker: usize) {
        let order_id = job.order_id().clone();
        if !self.ctx.idempotency.try_commit(&order_id, receipt).await {
            debug!(worker, %order_id, "Charge already committed by another execution");
            self.settle(&order_id, OrderStatus::Paid).await;
            return;
        }

        if !self.ctx.inventory.reserve(&order_id).await {
            warn!(worker, %order_id, "Inventory reservation failed after charge");
            self.dead_letter(job, attempt, "inventory unavailable").await;
            return;
        }

        info!(worker, %order_id, attempt, "Order paid");
        self.settle(&order_id, OrderStatus::Paid).await;
    }

    async fn on_transient(&self, job: Job, err: GatewayError, attempt: u32, worker: usize) {
        let order_id = job.order_id().clone();
        if self.retry.is_exhausted(attempt) {
            warn!(worker, %order_id, attempt, error = %err, "Retries exhausted");
            self.dead_letter(job, attempt, err.to_string()).await;
            return;
        }

        let now = self.ctx.clock.now();
        let eligible_at = now.saturating_add(self.retry.next_delay(attempt));
        info!(worker, %order_id, attempt, eligible_at, error = %err, "Retry scheduled");
        self.requeue(job.reschedule(attempt, eligible_at)).await;
    }

    async fn requeue(&self, job: Job) {
        if let Err(full) = self.ctx.queue.enqueue(job).await {
            warn!(
                order_id = %full.job.order_id(),
                capacity = full.capacity,
                "Queue full, holding retry until space frees up"
            );
            self.overflow.lock().await.push_back(full.job);
        }
    }

    async fn flush_overflow(&self) {
        let mut overflow = self.overflow.lock().await;
        while let Some(job) = overflow.pop_front() {
            if let Err(full) = self.ctx.queue.enqueue(job).await {
                overflow.push_front(full.job);
                break;
            }
        }
    }

    async fn dead_letter(&self, job: Job, attempts: u32, reason: impl Into<String>) {
        let entry = DeadLetterEntry::new(&job, attempts, reason, self.ctx.clock.now());
        self.settle(&entry.order_id, OrderStatus::Failed).await;
        self.ctx.dead_letters.push(entry).await;
    }

    /// Moves the order to its final status, tolerating a repeat of the same
    /// outcome.
    async fn settle(&self, order_id: &OrderId, status: OrderStatus) {
        match self.ctx.orders.transition(order_id, status).await {
            Ok(_) => {}
            Err(OrderError::InvalidTransition { from, .. }) if from == status => {}
            Err(e) => warn!(%order_id, %status, "Could not update order: {}", e),
        }
    }

    async fn is_idle(&self) -> bool {
        let overflow = self.overflow.lock().await;
        let snapshot = self.ctx.queue.snapshot(self.ctx.clock.now()).await;
        let held_retry_fits =
            !overflow.is_empty() && snapshot.queued < self.ctx.queue.capacity();
        snapshot.is_idle() && !held_retry_fits
    }

    async fn is_drained(&self) -> bool {
        // Holding the overflow lock keeps workers from moving jobs between
        // the overflow buffer and the queue while the snapshot is taken.
        let overflow = self.overflow.lock().await;
        let snapshot = self.ctx.queue.snapshot(self.ctx.clock.now()).await;
        overflow.is_empty() && snapshot.is_drained()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessingConfig;
    use crate::domain::job::ChargeRequest;
    use crate::domain::order::{Amount, UserId};
    use crate::domain::ports::Clock;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::gateway::SimulatedGateway;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct Harness {
        ctx: ProcessingContext,
        pool: WorkerPool,
        clock: Arc<ManualClock>,
        gateway: Arc<SimulatedGateway>,
    }

    fn harness(config: ProcessingConfig, gateway: SimulatedGateway) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let gateway = Arc::new(gateway);
        let ctx = ProcessingContext::in_memory(config, gateway.clone(), clock.clone()).unwrap();
        Harness {
            pool: ctx.worker_pool(),
            ctx,
            clock,
            gateway,
        }
    }

    fn job(id: &str) -> Job {
        let request = ChargeRequest {
            order_id: OrderId::from(id),
            user_id: UserId::from("user-1"),
            amount: Amount::new(dec!(12.5)).unwrap(),
        };
        Job::new(request, 0)
    }

    async fn idle(pool: &WorkerPool) {
        tokio::time::timeout(TIMEOUT, pool.wait_idle())
            .await
            .expect("pool should become idle");
    }

    #[tokio::test]
    async fn test_retry_lands_back_in_queue() {
        let h = harness(
            ProcessingConfig {
                base_backoff: 4,
                ..Default::default()
            },
            SimulatedGateway::new().with_transient_failures("order-1", 1),
        );
        h.ctx.queue.enqueue(job("order-1")).await.unwrap();
        h.pool.start(1).await;
        idle(&h.pool).await;

        assert_eq!(h.ctx.queue.size().await, 1);
        assert_eq!(h.ctx.queue.next_eligible_time().await, Some(4));

        h.clock.advance(4);
        idle(&h.pool).await;
        assert!(h.ctx.queue.is_empty().await);
        assert_eq!(h.gateway.charge_count(&OrderId::from("order-1")).await, 1);

        h.pool.stop(false).await;
    }

    #[tokio::test]
    async fn test_full_queue_retry_is_held_not_dropped() {
        let h = harness(
            ProcessingConfig {
                queue_capacity: 1,
                base_backoff: 1,
                ..Default::default()
            },
            SimulatedGateway::new().with_transient_failures("order-1", 1),
        );
        h.ctx.queue.enqueue(job("order-1")).await.unwrap();

        // Run the first attempt directly so the retry races a full queue.
        let taken = h.ctx.queue.dequeue_ready(0).await.unwrap();
        h.ctx
            .queue
            .enqueue(job("blocker").reschedule(0, 100))
            .await
            .unwrap();
        h.pool.shared.execute(taken, 0).await;
        h.ctx.queue.acknowledge().await;

        assert_eq!(h.pool.overflow_len().await, 1);
        assert!(!h.pool.is_drained().await);

        // Once the blocker leaves the queue the held retry gets in.
        h.ctx.queue.dequeue_ready(100).await.unwrap();
        h.ctx.queue.acknowledge().await;
        assert!(!h.pool.shared.is_idle().await);
        h.pool.shared.flush_overflow().await;
        assert_eq!(h.pool.overflow_len().await, 0);
        assert_eq!(h.ctx.queue.size().await, 1);
        assert_eq!(h.clock.now(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_drain_keeps_jobs() {
        let h = harness(ProcessingConfig::default(), SimulatedGateway::new());
        h.pool.start(2).await;
        h.pool.stop(false).await;

        h.ctx.queue.enqueue(job("order-1")).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(h.ctx.queue.size().await, 1);

        h.pool.start(2).await;
        tokio::time::timeout(TIMEOUT, h.pool.stop(true))
            .await
            .expect("drain should finish");
        assert!(h.ctx.queue.is_empty().await);
        assert_eq!(h.gateway.charge_count(&OrderId::from("order-1")).await, 1);
    }
}

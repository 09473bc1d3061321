//! Application layer containing the order processing orchestration.
//!
//! `CheckoutService` accepts orders and queues their charge jobs, while
//! `WorkerPool` executes those jobs concurrently on `tokio` tasks, applying the
//! `RetryScheduler` backoff policy and routing exhausted jobs to the dead
//! letter queue.

pub mod checkout;
pub mod context;
pub mod retry;
pub mod worker_pool;

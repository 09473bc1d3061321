use super::job::{Job, LogicalTime};
use super::order::OrderId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Proof of a successful charge, kept in the idempotency record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Receipt {
    pub order_id: OrderId,
    pub charged: bool,
    /// Gateway-side attempt number at which the charge went through.
    pub attempt: u32,
}

/// Failure reported by a payment gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("transient gateway failure: {0}")]
    Transient(String),
    #[error("permanent gateway failure: {0}")]
    Permanent(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }
}

/// Terminal record of a job that will not be attempted again.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DeadLetterEntry {
    #[serde(rename = "order")]
    pub order_id: OrderId,
    /// Total executions performed before giving up.
    pub attempts: u32,
    pub reason: String,
    pub enqueued_at: LogicalTime,
}

impl DeadLetterEntry {
    pub fn new(job: &Job, attempts: u32, reason: impl Into<String>, now: LogicalTime) -> Self {
        Self {
            order_id: job.order_id().clone(),
            attempts,
            reason: reason.into(),
            enqueued_at: now,
        }
    }
}

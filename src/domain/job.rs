use super::order::{Amount, Order, OrderId, UserId};
use serde::{Deserialize, Serialize};

/// Elapsed logical time units since the clock started.
pub type LogicalTime = u64;

/// Everything a gateway needs to charge an order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Amount,
}

impl From<&Order> for ChargeRequest {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            user_id: order.user_id.clone(),
            amount: order.amount,
        }
    }
}

/// One unit of charging work.
///
/// A job is never mutated while queued. A failed execution produces a new job
/// through [`Job::reschedule`] carrying the next attempt number.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Job {
    /// Number of executions already performed.
    pub attempt: u32,
    /// The job must not run before this logical time.
    pub next_eligible_time: LogicalTime,
    pub payload: ChargeRequest,
}

impl Job {
    pub fn new(payload: ChargeRequest, now: LogicalTime) -> Self {
        Self {
            attempt: 0,
            next_eligible_time: now,
            payload,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.payload.order_id
    }

    pub fn is_eligible(&self, now: LogicalTime) -> bool {
        self.next_eligible_time <= now
    }

    /// Builds the follow-up job for a failed execution.
    pub fn reschedule(self, attempt: u32, next_eligible_time: LogicalTime) -> Self {
        Self {
            attempt,
            next_eligible_time,
            payload: self.payload,
        }
    }
}

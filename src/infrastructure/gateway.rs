use crate::domain::job::ChargeRequest;
use crate::domain::order::OrderId;
use crate::domain::payment::{GatewayError, Receipt};
use crate::domain::ports::PaymentGateway;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Default, Clone, Copy)]
struct ChargeCounters {
    attempts: u32,
    charges: u32,
}

/// Payment gateway simulation with deterministic, per-order failures.
///
/// An order configured with `n` transient failures fails its first `n`
/// charge attempts and succeeds afterwards. An order configured as a permanent
/// failure is always rejected. Attempts and successful charges are counted per
/// order so callers can verify that nothing was charged twice.
#[derive(Default)]
pub struct SimulatedGateway {
    transient_failures: HashMap<OrderId, u32>,
    permanent_failures: HashSet<OrderId>,
    counters: Mutex<HashMap<OrderId, ChargeCounters>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transient_failures(mut self, order_id: impl Into<OrderId>, count: u32) -> Self {
        self.transient_failures.insert(order_id.into(), count);
        self
    }

    pub fn with_permanent_failure(mut self, order_id: impl Into<OrderId>) -> Self {
        self.permanent_failures.insert(order_id.into());
        self
    }

    /// Number of times `charge` was invoked for the order.
    pub async fn attempt_count(&self, order_id: &OrderId) -> u32 {
        let counters = self.counters.lock().await;
        counters.get(order_id).map_or(0, |c| c.attempts)
    }

    /// Number of successful charges for the order.
    pub async fn charge_count(&self, order_id: &OrderId) -> u32 {
        let counters = self.counters.lock().await;
        counters.get(order_id).map_or(0, |c| c.charges)
    }

    pub async fn total_charges(&self) -> u32 {
        let counters = self.counters.lock().await;
        counters.values().map(|c| c.charges).sum()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<Receipt, GatewayError> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(request.order_id.clone()).or_default();
        counter.attempts += 1;
        let attempt = counter.attempts;

        if self.permanent_failures.contains(&request.order_id) {
            return Err(GatewayError::Permanent(format!(
                "card declined for order {}",
                request.order_id
            )));
        }

        let failures = self
            .transient_failures
            .get(&request.order_id)
            .copied()
            .unwrap_or(0);
        if attempt <= failures {
            return Err(GatewayError::Transient(format!(
                "payment gateway error for order {} (attempt {})",
                request.order_id, attempt
            )));
        }

        counter.charges += 1;
        Ok(Receipt {
            order_id: request.order_id.clone(),
            charged: true,
            attempt,
        })
    }
}

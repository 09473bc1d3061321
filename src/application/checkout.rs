use super::context::ProcessingContext;
use crate::domain::job::{ChargeRequest, Job};
use crate::domain::order::{Amount, Order, OrderId, OrderStatus, UserId};
use crate::domain::ports::{ClockRef, OrderStoreRef};
use crate::error::{OrderError, Result};
use crate::infrastructure::queue::BoundedJobQueue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CheckoutError {
    /// The order was stored as `pending` but its job could not be queued.
    /// Retry later with [`CheckoutService::resubmit`].
    #[error("System busy: order {order_id} is pending but the queue is full (capacity {capacity})")]
    QueueFull { order_id: OrderId, capacity: usize },
    #[error(transparent)]
    Order(#[from] OrderError),
}

impl CheckoutError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::QueueFull { .. })
    }
}

/// Accepts checkouts and hands the charging work to the background queue.
///
/// `checkout` returns as soon as the order is stored and its job is queued;
/// the worker pool settles the order later.
#[derive(Clone)]
pub struct CheckoutService {
    orders: OrderStoreRef,
    queue: Arc<BoundedJobQueue>,
    clock: ClockRef,
}

impl CheckoutService {
    pub fn new(ctx: &ProcessingContext) -> Self {
        Self {
            orders: ctx.orders.clone(),
            queue: ctx.queue.clone(),
            clock: ctx.clock.clone(),
        }
    }

    /// Creates a pending order with a generated id and queues its charge.
    pub async fn checkout(
        &self,
        user_id: UserId,
        amount: Amount,
    ) -> std::result::Result<OrderId, CheckoutError> {
        self.checkout_with_id(OrderId::generate(), user_id, amount)
            .await
    }

    /// Same as [`CheckoutService::checkout`] with a caller-assigned order id.
    pub async fn checkout_with_id(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Amount,
    ) -> std::result::Result<OrderId, CheckoutError> {
        let order = Order::new(order_id.clone(), user_id, amount);
        let request = ChargeRequest::from(&order);
        self.orders.insert(order).await?;

        self.enqueue(request).await?;
        info!(%order_id, "Checkout accepted");
        Ok(order_id)
    }

    /// Queues a fresh charge job for an order that is still pending.
    pub async fn resubmit(&self, order_id: &OrderId) -> std::result::Result<(), CheckoutError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatus::Pending {
            return Err(OrderError::ValidationError(format!(
                "order {} is already {}",
                order_id, order.status
            ))
            .into());
        }

        self.enqueue(ChargeRequest::from(&order)).await?;
        info!(%order_id, "Order resubmitted");
        Ok(())
    }

    pub async fn get_status(&self, order_id: &OrderId) -> Result<OrderStatus> {
        self.get_order(order_id).await.map(|order| order.status)
    }

    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.clone()))
    }

    async fn enqueue(&self, request: ChargeRequest) -> std::result::Result<(), CheckoutError> {
        let job = Job::new(request, self.clock.now());
        self.queue.enqueue(job).await.map_err(|full| {
            let order_id = full.job.order_id().clone();
            warn!(%order_id, capacity = full.capacity, "Queue full, order left pending");
            CheckoutError::QueueFull {
                order_id,
                capacity: full.capacity,
            }
        })
    }
}

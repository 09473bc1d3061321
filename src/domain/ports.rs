use super::job::{ChargeRequest, LogicalTime};
use super::order::{Order, OrderId, OrderStatus};
use super::payment::{GatewayError, Receipt};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Charges money for an order. Implementations do not deduplicate.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> std::result::Result<Receipt, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FraudVerdict {
    Clear,
    Reject(String),
}

pub trait FraudCheck: Send + Sync {
    fn screen(&self, request: &ChargeRequest) -> FraudVerdict;
}

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Returns `false` when stock cannot be reserved for the order.
    async fn reserve(&self, order_id: &OrderId) -> bool;
}

/// Source of logical time. Only advanced explicitly, never by sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> LogicalTime;
    /// Receiver that observes every advance of the clock.
    fn subscribe(&self) -> watch::Receiver<LogicalTime>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Stores a new order, failing with `DuplicateOrder` if the id is taken.
    async fn insert(&self, order: Order) -> Result<()>;
    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>>;
    /// Atomically applies a status transition and returns the updated order.
    async fn transition(&self, order_id: &OrderId, next: OrderStatus) -> Result<Order>;
    async fn all_orders(&self) -> Result<Vec<Order>>;
}

/// Outcome of claiming an order before charging it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The caller now owns the charge attempt and must commit or release.
    Acquired,
    /// Another execution currently holds the order.
    InFlight,
    /// The charge has already been committed.
    Committed,
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn try_reserve(&self, order_id: &OrderId) -> Reservation;
    /// Drops an uncommitted reservation so a later attempt can claim it.
    async fn release(&self, order_id: &OrderId);
    /// Records the committed charge. Returns `true` only for the call that
    /// performed the commit.
    async fn try_commit(&self, order_id: &OrderId, receipt: Receipt) -> bool;
    async fn is_committed(&self, order_id: &OrderId) -> bool;
    async fn receipt(&self, order_id: &OrderId) -> Option<Receipt>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type FraudCheckRef = Arc<dyn FraudCheck>;
pub type InventoryRef = Arc<dyn Inventory>;
pub type ClockRef = Arc<dyn Clock>;
pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type IdempotencyStoreRef = Arc<dyn IdempotencyStore>;

use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::payment::Receipt;
use crate::domain::ports::{IdempotencyStore, OrderStore, Reservation};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for orders.
///
/// Uses `Arc<RwLock<HashMap<OrderId, Order>>>` to allow shared concurrent access.
/// Status changes go through [`OrderStore::transition`] so that concurrent
/// workers can never both move an order out of `pending`.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        match orders.entry(order.order_id.clone()) {
            Entry::Occupied(_) => Err(OrderError::DuplicateOrder(order.order_id)),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(order_id).cloned())
    }

    async fn transition(&self, order_id: &OrderId, next: OrderStatus) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::OrderNotFound(order_id.clone()))?;
        order.transition_to(next)?;
        Ok(order.clone())
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        Ok(all)
    }
}

#[derive(Debug, Clone)]
enum RecordState {
    Reserved,
    Committed(Receipt),
}

/// A thread-safe in-memory idempotency store keyed by order id.
///
/// Every check-then-write happens under a single write lock, which makes
/// reservation and commit atomic with respect to each other.
#[derive(Default, Clone)]
pub struct InMemoryIdempotencyStore {
    records: Arc<RwLock<HashMap<OrderId, RecordState>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn try_reserve(&self, order_id: &OrderId) -> Reservation {
        let mut records = self.records.write().await;
        match records.entry(order_id.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                RecordState::Reserved => Reservation::InFlight,
                RecordState::Committed(_) => Reservation::Committed,
            },
            Entry::Vacant(slot) => {
                slot.insert(RecordState::Reserved);
                Reservation::Acquired
            }
        }
    }

    async fn release(&self, order_id: &OrderId) {
        let mut records = self.records.write().await;
        if let Some(RecordState::Reserved) = records.get(order_id) {
            records.remove(order_id);
        }
    }

    async fn try_commit(&self, order_id: &OrderId, receipt: Receipt) -> bool {
        let mut records = self.records.write().await;
        match records.get(order_id) {
            Some(RecordState::Committed(_)) => false,
            _ => {
                records.insert(order_id.clone(), RecordState::Committed(receipt));
                true
            }
        }
    }

    async fn is_committed(&self, order_id: &OrderId) -> bool {
        let records = self.records.read().await;
        matches!(records.get(order_id), Some(RecordState::Committed(_)))
    }

    async fn receipt(&self, order_id: &OrderId) -> Option<Receipt> {
        let records = self.records.read().await;
        match records.get(order_id) {
            Some(RecordState::Committed(receipt)) => Some(receipt.clone()),
            _ => None,
        }
    }
}

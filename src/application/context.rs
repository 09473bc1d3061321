use super::checkout::CheckoutService;
use super::worker_pool::WorkerPool;
use crate::config::ProcessingConfig;
use crate::domain::ports::{
    ClockRef, IdempotencyStoreRef, InventoryRef, OrderStoreRef, PaymentGatewayRef,
};
use crate::error::Result;
use crate::infrastructure::dead_letter::DeadLetterQueue;
use crate::infrastructure::in_memory::{InMemoryIdempotencyStore, InMemoryOrderStore};
use crate::infrastructure::inventory::UnlimitedInventory;
use crate::infrastructure::queue::BoundedJobQueue;
use std::sync::Arc;

/// The shared objects of one processing pipeline.
///
/// Built once and handed by reference to the checkout service and the worker
/// pool. Cloning is cheap and shares every collaborator.
#[derive(Clone)]
pub struct ProcessingContext {
    pub config: ProcessingConfig,
    pub queue: Arc<BoundedJobQueue>,
    pub dead_letters: Arc<DeadLetterQueue>,
    pub orders: OrderStoreRef,
    pub idempotency: IdempotencyStoreRef,
    pub gateway: PaymentGatewayRef,
    pub inventory: InventoryRef,
    pub clock: ClockRef,
}

impl ProcessingContext {
    /// Creates a context backed by in-memory stores and unlimited inventory.
    pub fn in_memory(
        config: ProcessingConfig,
        gateway: PaymentGatewayRef,
        clock: ClockRef,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            queue: Arc::new(BoundedJobQueue::new(config.queue_capacity)),
            dead_letters: Arc::new(DeadLetterQueue::new()),
            orders: Arc::new(InMemoryOrderStore::new()),
            idempotency: Arc::new(InMemoryIdempotencyStore::new()),
            inventory: Arc::new(UnlimitedInventory),
            config,
            gateway,
            clock,
        })
    }

    pub fn with_inventory(mut self, inventory: InventoryRef) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn checkout_service(&self) -> CheckoutService {
        CheckoutService::new(self)
    }

    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::new(self.clone())
    }
}

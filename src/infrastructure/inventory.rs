use crate::domain::order::OrderId;
use crate::domain::ports::Inventory;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Inventory that never runs out.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlimitedInventory;

#[async_trait]
impl Inventory for UnlimitedInventory {
    async fn reserve(&self, _order_id: &OrderId) -> bool {
        true
    }
}

#[derive(Debug)]
struct Stock {
    remaining: u32,
    reserved: HashSet<OrderId>,
}

/// Inventory holding a fixed number of units, one per order.
///
/// Reserving the same order twice only consumes one unit.
#[derive(Debug)]
pub struct StockInventory {
    stock: Mutex<Stock>,
}

impl StockInventory {
    pub fn new(units: u32) -> Self {
        Self {
            stock: Mutex::new(Stock {
                remaining: units,
                reserved: HashSet::new(),
            }),
        }
    }

    pub async fn remaining(&self) -> u32 {
        self.stock.lock().await.remaining
    }
}

#[async_trait]
impl Inventory for StockInventory {
    async fn reserve(&self, order_id: &OrderId) -> bool {
        let mut stock = self.stock.lock().await;
        if stock.reserved.contains(order_id) {
            return true;
        }
        if stock.remaining == 0 {
            return false;
        }
        stock.remaining -= 1;
        stock.reserved.insert(order_id.clone());
        true
    }
}

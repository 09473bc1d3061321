use crate::domain::order::OrderId;
use crate::domain::payment::DeadLetterEntry;
use tokio::sync::RwLock;

/// Terminal sink for jobs that will not be attempted again.
///
/// Entries are append-only and exposed read-only for inspection.
#[derive(Default)]
pub struct DeadLetterQueue {
    entries: RwLock<Vec<DeadLetterEntry>>,
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, entry: DeadLetterEntry) {
        self.entries.write().await.push(entry);
    }

    /// Snapshot of all entries in arrival order.
    pub async fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn find(&self, order_id: &OrderId) -> Option<DeadLetterEntry> {
        let entries = self.entries.read().await;
        entries.iter().find(|e| &e.order_id == order_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, attempts: u32) -> DeadLetterEntry {
        DeadLetterEntry {
            order_id: OrderId::from(id),
            attempts,
            reason: "gateway down".to_string(),
            enqueued_at: 4,
        }
    }

    #[tokio::test]
    async fn test_push_and_inspect() {
        let dlq = DeadLetterQueue::new();
        assert!(dlq.is_empty().await);

        dlq.push(entry("order-1", 4)).await;
        dlq.push(entry("order-2", 1)).await;

        assert_eq!(dlq.len().await, 2);
        let entries = dlq.entries().await;
        assert_eq!(entries[0].order_id, OrderId::from("order-1"));
        assert_eq!(entries[1].attempts, 1);

        let found = dlq.find(&OrderId::from("order-2")).await.unwrap();
        assert_eq!(found.reason, "gateway down");
        assert!(dlq.find(&OrderId::from("order-3")).await.is_none());
    }
}

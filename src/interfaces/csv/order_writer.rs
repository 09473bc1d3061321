use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::DeadLetterEntry;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRow<'a> {
    order: &'a str,
    user: &'a str,
    amount: Decimal,
    status: OrderStatus,
}

#[derive(Serialize)]
struct DeadLetterRow<'a> {
    order: &'a str,
    attempts: u32,
    reason: &'a str,
    enqueued_at: u64,
}

/// Writes final order states and dead letter entries as CSV.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders(&mut self, orders: &[Order]) -> Result<()> {
        for order in orders {
            self.writer.serialize(OrderRow {
                order: order.order_id.as_str(),
                user: order.user_id.as_str(),
                amount: order.amount.value().normalize(),
                status: order.status,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_dead_letters(&mut self, entries: &[DeadLetterEntry]) -> Result<()> {
        for entry in entries {
            self.writer.serialize(DeadLetterRow {
                order: entry.order_id.as_str(),
                attempts: entry.attempts,
                reason: &entry.reason,
                enqueued_at: entry.enqueued_at,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

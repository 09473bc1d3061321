use crate::error::OrderError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Business identifier of an order, also used as the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Represents a positive monetary amount to be charged.
///
/// This is a wrapper around `rust_decimal::Decimal` so that an order can never
/// be created for a zero or negative charge.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, OrderError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(OrderError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = OrderError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A customer order and its payment status.
///
/// Status only ever moves out of `Pending`, once, into `Paid` or `Failed`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    #[serde(rename = "order")]
    pub order_id: OrderId,
    #[serde(rename = "user")]
    pub user_id: UserId,
    pub amount: Amount,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(order_id: OrderId, user_id: UserId, amount: Amount) -> Self {
        Self {
            order_id,
            user_id,
            amount,
            status: OrderStatus::Pending,
        }
    }

    /// Moves the order into a terminal status.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if self.status.is_terminal() || !next.is_terminal() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order::new(
            OrderId::from("order-1"),
            UserId::from("user-1"),
            Amount::new(dec!(10.00)).unwrap(),
        )
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(OrderError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(OrderError::ValidationError(_))
        ));
    }

    #[test]
    fn test_amount_rejected_on_deserialize() {
        let result: Result<Amount, _> = serde_json::from_str("\"-5\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_new_order_is_pending() {
        assert_eq!(order().status, OrderStatus::Pending);
    }

    #[test]
    fn test_transition_to_paid() {
        let mut order = order();
        order.transition_to(OrderStatus::Paid).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut order = order();
        order.transition_to(OrderStatus::Failed).unwrap();

        let result = order.transition_to(OrderStatus::Paid);
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Failed,
                to: OrderStatus::Paid
            })
        ));
        assert_eq!(order.status, OrderStatus::Failed);
    }

    #[test]
    fn test_cannot_reenter_pending() {
        let mut order = order();
        assert!(order.transition_to(OrderStatus::Pending).is_err());

        order.transition_to(OrderStatus::Paid).unwrap();
        assert!(order.transition_to(OrderStatus::Pending).is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::Paid).unwrap();
        assert_eq!(json, "\"paid\"");
        assert_eq!(OrderStatus::Failed.to_string(), "failed");
    }
}

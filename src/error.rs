use crate::domain::order::{OrderId, OrderStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Order {0} already exists")]
    DuplicateOrder(OrderId),
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrderError>;

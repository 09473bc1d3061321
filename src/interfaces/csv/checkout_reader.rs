use crate::domain::order::{Amount, OrderId, UserId};
use crate::error::{OrderError, Result};
use serde::Deserialize;
use std::io::Read;

/// One checkout request, plus the simulated gateway behaviour for its order.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CheckoutRecord {
    pub order: OrderId,
    pub user: UserId,
    pub amount: Amount,
    /// Charge attempts that fail transiently before the gateway succeeds.
    #[serde(default)]
    pub transient_failures: Option<u32>,
    /// Whether the gateway declines the order outright.
    #[serde(default)]
    pub permanent: Option<bool>,
}

impl CheckoutRecord {
    pub fn transient_failures(&self) -> u32 {
        self.transient_failures.unwrap_or(0)
    }

    pub fn is_permanent_failure(&self) -> bool {
        self.permanent.unwrap_or(false)
    }
}

/// Reads checkout requests from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<CheckoutRecord>`.
/// It handles whitespace trimming and flexible record lengths automatically, so
/// the trailing failure columns may be omitted.
pub struct CheckoutReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CheckoutReader<R> {
    /// Creates a new `CheckoutReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes requests.
    pub fn records(self) -> impl Iterator<Item = Result<CheckoutRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(OrderError::from))
    }
}

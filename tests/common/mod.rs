#![allow(dead_code)]

use async_trait::async_trait;
use orderflow::application::checkout::CheckoutService;
use orderflow::application::context::ProcessingContext;
use orderflow::application::worker_pool::WorkerPool;
use orderflow::config::ProcessingConfig;
use orderflow::domain::job::{ChargeRequest, LogicalTime};
use orderflow::domain::order::{Amount, OrderId};
use orderflow::domain::payment::{GatewayError, Receipt};
use orderflow::domain::ports::{ClockRef, PaymentGateway, PaymentGatewayRef};
use orderflow::infrastructure::clock::ManualClock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub struct Pipeline {
    pub ctx: ProcessingContext,
    pub service: CheckoutService,
    pub pool: WorkerPool,
    pub clock: Arc<ManualClock>,
}

pub fn pipeline(config: ProcessingConfig, gateway: PaymentGatewayRef) -> Pipeline {
    pipeline_with_clock(config, gateway, Arc::new(ManualClock::new()))
}

pub fn pipeline_with_clock(
    config: ProcessingConfig,
    gateway: PaymentGatewayRef,
    clock: Arc<ManualClock>,
) -> Pipeline {
    let ctx = ProcessingContext::in_memory(config, gateway, clock.clone()).unwrap();
    Pipeline {
        service: ctx.checkout_service(),
        pool: ctx.worker_pool(),
        ctx,
        clock,
    }
}

impl Pipeline {
    pub async fn idle(&self) {
        tokio::time::timeout(TIMEOUT, self.pool.wait_idle())
            .await
            .expect("pool should become idle");
    }

    /// Ticks the clock one unit at a time until every job has settled.
    pub async fn run_to_completion(&self) {
        let drive = async {
            loop {
                self.pool.wait_idle().await;
                if self.pool.is_drained().await {
                    return;
                }
                self.clock.advance(1);
            }
        };
        tokio::time::timeout(TIMEOUT, drive)
            .await
            .expect("pipeline should drain");
    }
}

pub fn amount(value: &str) -> Amount {
    Amount::new(value.parse::<Decimal>().unwrap()).unwrap()
}

/// Gateway that follows a per-order script of outcomes and records the logical
/// time of every attempt. Orders without a script, or past its end, succeed.
pub struct ScriptedGateway {
    clock: ClockRef,
    scripts: Mutex<HashMap<OrderId, Vec<Result<(), GatewayError>>>>,
    attempts: Mutex<HashMap<OrderId, Vec<LogicalTime>>>,
    calls: Mutex<Vec<OrderId>>,
    charges: Mutex<HashMap<OrderId, u32>>,
}

impl ScriptedGateway {
    pub fn new(clock: ClockRef) -> Self {
        Self {
            clock,
            scripts: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            charges: Mutex::new(HashMap::new()),
        }
    }

    /// Order ids in the order their charges were attempted.
    pub async fn calls(&self) -> Vec<OrderId> {
        self.calls.lock().await.clone()
    }

    pub async fn script(&self, order_id: &str, outcomes: Vec<Result<(), GatewayError>>) {
        self.scripts
            .lock()
            .await
            .insert(OrderId::from(order_id), outcomes);
    }

    pub async fn attempt_times(&self, order_id: &str) -> Vec<LogicalTime> {
        self.attempts
            .lock()
            .await
            .get(&OrderId::from(order_id))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn charges(&self, order_id: &str) -> u32 {
        self.charges
            .lock()
            .await
            .get(&OrderId::from(order_id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<Receipt, GatewayError> {
        let mut attempts = self.attempts.lock().await;
        let times = attempts.entry(request.order_id.clone()).or_default();
        times.push(self.clock.now());
        let attempt = times.len() as u32;
        drop(attempts);
        self.calls.lock().await.push(request.order_id.clone());

        let outcome = self
            .scripts
            .lock()
            .await
            .get(&request.order_id)
            .and_then(|script| script.get(attempt as usize - 1).cloned())
            .unwrap_or(Ok(()));
        outcome?;

        *self
            .charges
            .lock()
            .await
            .entry(request.order_id.clone())
            .or_default() += 1;
        Ok(Receipt {
            order_id: request.order_id.clone(),
            charged: true,
            attempt,
        })
    }
}

/// Gateway that parks every charge until released, to force executions to
/// overlap.
pub struct GatedGateway {
    gate: tokio::sync::Semaphore,
    charges: Mutex<HashMap<OrderId, u32>>,
}

impl GatedGateway {
    pub fn new() -> Self {
        Self {
            gate: tokio::sync::Semaphore::new(0),
            charges: Mutex::new(HashMap::new()),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(tokio::sync::Semaphore::MAX_PERMITS / 2);
    }

    pub async fn charges(&self, order_id: &str) -> u32 {
        self.charges
            .lock()
            .await
            .get(&OrderId::from(order_id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PaymentGateway for GatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<Receipt, GatewayError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        let mut charges = self.charges.lock().await;
        let count = charges.entry(request.order_id.clone()).or_default();
        *count += 1;
        Ok(Receipt {
            order_id: request.order_id.clone(),
            charged: true,
            attempt: *count,
        })
    }
}

pub fn write_requests(path: &Path, rows: &[[&str; 5]]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["order", "user", "amount", "transient_failures", "permanent"])?;
    for row in rows {
        wtr.write_record(row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn generate_requests(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["order", "user", "amount", "transient_failures", "permanent"])?;
    for i in 1..=rows {
        wtr.write_record([
            format!("order-{i}").as_str(),
            "user-1",
            "1.0",
            &(i % 3).to_string(),
            "false",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

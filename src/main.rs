use clap::Parser;
use miette::{IntoDiagnostic, Result};
use orderflow::application::checkout::{CheckoutError, CheckoutService};
use orderflow::application::context::ProcessingContext;
use orderflow::application::worker_pool::WorkerPool;
use orderflow::config::ProcessingConfig;
use orderflow::domain::order::{OrderId, OrderStatus, UserId};
use orderflow::domain::ports::{Clock, PaymentGatewayRef};
use orderflow::infrastructure::clock::ManualClock;
use orderflow::infrastructure::fraud::{BlocklistFraudCheck, FraudScreenedGateway};
use orderflow::infrastructure::gateway::SimulatedGateway;
use orderflow::infrastructure::inventory::StockInventory;
use orderflow::interfaces::csv::checkout_reader::{CheckoutReader, CheckoutRecord};
use orderflow::interfaces::csv::order_writer::OrderWriter;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input checkout requests CSV file
    input: PathBuf,

    /// JSON file with processing settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Queue capacity (overrides the config file)
    #[arg(long)]
    capacity: Option<usize>,

    /// Number of workers (overrides the config file)
    #[arg(long)]
    workers: Option<usize>,

    /// Retries after the first attempt (overrides the config file)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Base backoff in logical time units (overrides the config file)
    #[arg(long)]
    backoff: Option<u64>,

    /// User whose charges are rejected by the fraud check. Repeatable.
    #[arg(long = "blocked-user")]
    blocked_users: Vec<String>,

    /// Units of stock available. Unlimited if omitted.
    #[arg(long)]
    stock: Option<u32>,

    /// Write dead letter entries to this CSV file
    #[arg(long)]
    dlq: Option<PathBuf>,
}

impl Cli {
    fn processing_config(&self) -> Result<ProcessingConfig> {
        let mut config = match &self.config {
            Some(path) => ProcessingConfig::from_file(path).into_diagnostic()?,
            None => ProcessingConfig::default(),
        };
        if let Some(capacity) = self.capacity {
            config.queue_capacity = capacity;
        }
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(backoff) = self.backoff {
            config.base_backoff = backoff;
        }
        config.validate().into_diagnostic()?;
        Ok(config)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(io::stderr().is_terminal())
                .with_writer(io::stderr),
        )
        .init();
}

fn build_gateway(records: &[CheckoutRecord], blocked_users: &[String]) -> PaymentGatewayRef {
    let simulated = records.iter().fold(SimulatedGateway::new(), |gateway, record| {
        let gateway = match record.transient_failures() {
            0 => gateway,
            n => gateway.with_transient_failures(record.order.clone(), n),
        };
        if record.is_permanent_failure() {
            gateway.with_permanent_failure(record.order.clone())
        } else {
            gateway
        }
    });

    if blocked_users.is_empty() {
        return Arc::new(simulated);
    }
    let check = BlocklistFraudCheck::new(blocked_users.iter().map(UserId::new));
    Arc::new(FraudScreenedGateway::new(
        Arc::new(simulated),
        Arc::new(check),
    ))
}

/// Advances logical time until the pool has nothing left to do.
async fn drive_to_completion(pool: &WorkerPool, clock: &ManualClock) {
    loop {
        pool.wait_idle().await;
        if pool.is_drained().await {
            return;
        }
        clock.advance(1);
    }
}

/// Submits an order, waiting for queue space whenever backpressure kicks in.
async fn submit(
    service: &CheckoutService,
    pool: &WorkerPool,
    clock: &ManualClock,
    record: CheckoutRecord,
) {
    let order_id: OrderId = record.order.clone();
    let mut result = service
        .checkout_with_id(record.order, record.user, record.amount)
        .await
        .map(|_| ());

    while let Err(CheckoutError::QueueFull { .. }) = result {
        pool.wait_idle().await;
        clock.advance(1);
        result = service.resubmit(&order_id).await;
    }

    if let Err(e) = result {
        warn!(%order_id, "Checkout rejected: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.processing_config()?;

    // Read every request up front so the gateway knows its simulated failures
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CheckoutReader::new(file);
    let mut records = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => records.push(record),
            Err(e) => warn!("Error reading checkout request: {}", e),
        }
    }

    let clock = Arc::new(ManualClock::new());
    let gateway = build_gateway(&records, &cli.blocked_users);
    let mut ctx =
        ProcessingContext::in_memory(config.clone(), gateway, clock.clone()).into_diagnostic()?;
    if let Some(units) = cli.stock {
        ctx = ctx.with_inventory(Arc::new(StockInventory::new(units)));
    }

    let service = ctx.checkout_service();
    let pool = ctx.worker_pool();
    pool.start(config.worker_count).await;

    for record in records {
        submit(&service, &pool, &clock, record).await;
    }
    drive_to_completion(&pool, &clock).await;
    pool.stop(true).await;

    let orders = ctx.orders.all_orders().await.into_diagnostic()?;
    let paid = orders.iter().filter(|o| o.status == OrderStatus::Paid).count();
    let failed = orders.iter().filter(|o| o.status == OrderStatus::Failed).count();
    info!(
        orders = orders.len(),
        paid,
        failed,
        elapsed = clock.now(),
        "Processing finished"
    );

    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(&orders).into_diagnostic()?;

    if let Some(path) = cli.dlq {
        let entries = ctx.dead_letters.entries().await;
        let file = File::create(path).into_diagnostic()?;
        OrderWriter::new(file)
            .write_dead_letters(&entries)
            .into_diagnostic()?;
    }

    Ok(())
}

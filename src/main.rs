use clap::Parser;
use miette::{IntoDiagnostic, Result};
use numwatch::application::catalog::Catalog;
use numwatch::application::checkout::{Checkout, CheckoutConfig};
use numwatch::application::inventory::Inventory;
use numwatch::application::journal::CodeJournal;
use numwatch::application::ledger::Ledger;
use numwatch::application::monitor::{Monitor, MonitorConfig};
use numwatch::domain::code::CodeFilter;
use numwatch::domain::events::{self, EngineEvent};
use numwatch::domain::listing::{Cart, ListingFilter, ListingSortKey, SortDirection};
use numwatch::domain::money::Amount;
use numwatch::domain::number::NumberStatus;
use numwatch::domain::ports::{AllocatorRef, InventoryStoreBox, JournalStoreBox};
use numwatch::infrastructure::demo::{AllocatorPolicy, DemoAllocator, DemoConfig, GuardedAllocator};
use numwatch::infrastructure::in_memory::{InMemoryInventoryStore, InMemoryJournalStore};
use numwatch::infrastructure::json_file::JsonFileStore;
#[cfg(feature = "storage-rocksdb")]
use numwatch::infrastructure::rocksdb::RocksDBStore;
use numwatch::interfaces::csv::listing_reader::read_catalog;
use numwatch::interfaces::csv::number_writer::NumberWriter;
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Listing catalog CSV file
    catalog: PathBuf,

    /// Directory for the JSON inventory and journal files
    #[arg(long, default_value = "numwatch-data")]
    data_dir: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Keep everything in memory; nothing survives the run
    #[arg(long)]
    no_persist: bool,

    /// Opening wallet deposit
    #[arg(long, default_value = "25.00")]
    deposit: Decimal,

    /// Buy the N cheapest listings that match the filters
    #[arg(long, default_value_t = 0)]
    buy: usize,

    /// Service filter ("all" matches everything)
    #[arg(long, default_value = "all")]
    service: String,

    /// Country filter ("all" matches everything)
    #[arg(long, default_value = "all")]
    country: String,

    /// Provider filter
    #[arg(long)]
    provider: Option<String>,

    /// Highest unit price to consider
    #[arg(long)]
    max_price: Option<Decimal>,

    /// Provider the allocator may spend money with; repeatable. Defaults
    /// to every provider in the catalog.
    #[arg(long)]
    allow_provider: Vec<String>,

    /// Watch owned numbers for codes for this many seconds after buying
    #[arg(long, default_value_t = 0)]
    watch_secs: u64,

    /// Seconds between polling cycles
    #[arg(long, default_value_t = 5)]
    poll_secs: u64,

    /// Demo provider order success probability (0.0 to 1.0)
    #[arg(long, default_value_t = 0.9)]
    success_rate: f64,

    /// Demo provider per-poll code probability (0.0 to 1.0)
    #[arg(long, default_value_t = 0.1)]
    code_chance: f64,

    /// Seed for the demo provider, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Write the owned-number export to this file instead of stdout
    #[arg(long)]
    export: Option<PathBuf>,

    /// Discard every journaled code before the run (requires --yes)
    #[arg(long)]
    clear_journal: bool,

    /// Confirm destructive operations
    #[arg(long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let (inventory_store, journal_store) = open_stores(&cli)?;
    let inventory = Arc::new(Inventory::load(inventory_store).await.into_diagnostic()?);
    let journal = Arc::new(CodeJournal::load(journal_store).await.into_diagnostic()?);

    if cli.clear_journal {
        if !cli.yes {
            miette::bail!("--clear-journal is irreversible; pass --yes to confirm");
        }
        journal.clear().await.into_diagnostic()?;
    }

    let ledger = if cli.deposit > Decimal::ZERO {
        let opening = Amount::new(cli.deposit).into_diagnostic()?;
        Arc::new(Ledger::with_opening_balance(opening))
    } else {
        Arc::new(Ledger::new())
    };

    let catalog_file = File::open(&cli.catalog).into_diagnostic()?;
    let catalog = Catalog::new();
    let snapshot = catalog.refresh(read_catalog(catalog_file)).await;
    if snapshot.is_empty() {
        tracing::warn!("catalog is empty, nothing can be bought");
    }

    let (events, mut rx) = events::channel();

    let demo = DemoAllocator::new(DemoConfig {
        success_rate: cli.success_rate,
        code_chance: cli.code_chance,
        seed: cli.seed,
    });
    let mut policy = AllocatorPolicy::deny_all();
    if cli.allow_provider.is_empty() {
        for listing in snapshot.listings() {
            policy = policy.allow(listing.provider.as_str());
        }
    } else {
        for provider in &cli.allow_provider {
            policy = policy.allow(provider.as_str());
        }
    }
    let allocator: AllocatorRef = Arc::new(GuardedAllocator::new(Arc::new(demo), policy));

    if cli.buy > 0 {
        let filter = ListingFilter {
            service: Some(cli.service.clone()),
            country: Some(cli.country.clone()),
            provider: cli.provider.clone(),
            min_price: None,
            max_price: cli.max_price,
        };
        let cart: Cart = snapshot
            .filter_sorted(&filter, ListingSortKey::Price, SortDirection::Ascending)
            .into_iter()
            .take(cli.buy)
            .collect();
        if cart.is_empty() {
            tracing::warn!("no listing matches the filters, skipping purchase");
        } else {
            let checkout = Arc::new(Checkout::new(
                Arc::clone(&ledger),
                Arc::clone(&inventory),
                Arc::clone(&allocator),
                events.clone(),
                CheckoutConfig::default(),
            ));
            let handle = checkout.spawn(cart);
            follow_purchase(&mut rx).await;
            let _ = handle.wait().await;
        }
    }

    if cli.watch_secs > 0 {
        let poll_interval = Duration::from_secs(cli.poll_secs.max(1));
        let monitor = Monitor::new(
            Arc::clone(&inventory),
            Arc::clone(&journal),
            Arc::clone(&allocator),
            events.clone(),
            MonitorConfig {
                poll_interval,
                ..MonitorConfig::default()
            },
        );

        let mut watched = 0usize;
        for number in inventory.snapshot().await {
            if matches!(
                number.status,
                NumberStatus::Active | NumberStatus::TelegramReady
            ) {
                monitor.watch(number.number_id).await.into_diagnostic()?;
                watched += 1;
            }
        }

        if watched == 0 {
            tracing::info!("no watchable numbers, skipping monitoring");
        } else {
            monitor.start(poll_interval).await;
            follow_codes(&mut rx, &inventory, Duration::from_secs(cli.watch_secs)).await;
            monitor.stop().await;
        }
    }

    let recent = journal
        .query(&CodeFilter {
            limit: Some(10),
            ..CodeFilter::default()
        })
        .await;
    for code in &recent {
        tracing::info!(
            number = %code.number_id,
            service = %code.service,
            code = %code.code,
            at = %code.observed_at,
            "journaled code"
        );
    }
    tracing::info!(
        balance = %ledger.balance().await,
        owned = inventory.len().await,
        codes = journal.len().await,
        "session complete"
    );

    let numbers = inventory.snapshot().await;
    match &cli.export {
        Some(path) => {
            let file = File::create(path).into_diagnostic()?;
            let mut writer = NumberWriter::new(file);
            writer.write_numbers(&numbers).into_diagnostic()?;
            tracing::info!(path = %path.display(), exported = numbers.len(), "owned numbers exported");
        }
        None => {
            let stdout = io::stdout();
            let mut writer = NumberWriter::new(stdout.lock());
            writer.write_numbers(&numbers).into_diagnostic()?;
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Stdout is reserved for the CSV export; everything else goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_stores(cli: &Cli) -> Result<(InventoryStoreBox, JournalStoreBox)> {
    if cli.no_persist {
        return Ok((
            Box::new(InMemoryInventoryStore::new()),
            Box::new(InMemoryJournalStore::new()),
        ));
    }

    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        let store = RocksDBStore::open(db_path).into_diagnostic()?;
        return Ok((Box::new(store.clone()), Box::new(store)));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if cli.db_path.is_some() {
        tracing::warn!("built without the storage-rocksdb feature, falling back to JSON files");
    }

    let store = JsonFileStore::open(&cli.data_dir).into_diagnostic()?;
    Ok((Box::new(store.clone()), Box::new(store)))
}

/// Prints purchase progress until the run's completion report arrives.
async fn follow_purchase(rx: &mut events::EventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            EngineEvent::PurchaseProgress(progress) => {
                tracing::info!(
                    percent = progress.percent,
                    listing = %progress.listing_id,
                    phase = ?progress.phase,
                    "purchase progress"
                );
            }
            EngineEvent::PurchaseCompleted(report) => {
                for item in &report.failed {
                    tracing::warn!(
                        listing = %item.listing.id,
                        reason = %item.reason,
                        "item failed"
                    );
                }
                if let Some(reason) = &report.aborted {
                    tracing::warn!(reason = ?reason, "purchase run stopped early");
                }
                tracing::info!(
                    succeeded = report.succeeded.len(),
                    failed = report.failed.len(),
                    spent = %report.total_spent,
                    "purchase finished"
                );
                return;
            }
            _ => {}
        }
    }
}

/// Consumes monitor events for `window`, recording each fresh code against
/// its number and flipping first-time receivers to `telegram_ready`.
async fn follow_codes(rx: &mut events::EventReceiver, inventory: &Inventory, window: Duration) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return;
        }
        match timeout(remaining, rx.recv()).await {
            Ok(Some(EngineEvent::NewCode(code))) => {
                tracing::info!(
                    number = %code.number_id,
                    service = %code.service,
                    code = %code.code,
                    "verification code"
                );
                if let Err(err) = inventory.record_code_seen(code.number_id, code.observed_at).await
                {
                    tracing::warn!(error = %err, "could not record code sighting");
                    continue;
                }
                let first_code = inventory
                    .get(code.number_id)
                    .await
                    .is_some_and(|n| n.status == NumberStatus::Active);
                if first_code
                    && let Err(err) = inventory
                        .transition(code.number_id, NumberStatus::TelegramReady)
                        .await
                {
                    tracing::warn!(error = %err, "could not mark number ready");
                }
            }
            Ok(Some(EngineEvent::MonitorStatus(status))) => {
                tracing::debug!(status = ?status, "monitor status");
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return,
        }
    }
}

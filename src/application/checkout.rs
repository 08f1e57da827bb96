use crate::application::inventory::Inventory;
use crate::application::ledger::Ledger;
use crate::domain::events::{
    AbortReason, EngineEvent, EventSender, FailedItem, ProgressEvent, PurchasePhase,
    PurchaseReport,
};
use crate::domain::listing::{Cart, Listing};
use crate::domain::money::Amount;
use crate::domain::number::OwnedNumber;
use crate::domain::ports::AllocatorRef;
use crate::error::EngineError;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Tunables for a purchase run.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutConfig {
    /// Upper bound on one allocator acquisition. A hung provider call fails
    /// the item instead of wedging the run.
    pub acquire_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Turns a cart into ledger debits and inventory entries.
///
/// Items are processed strictly in cart order: debit, acquire, add. Any
/// acquisition failure is refunded and recorded per item; insufficient
/// funds aborts the remaining cart. A run executes on a dedicated worker
/// via [`Checkout::spawn`] so the caller is never blocked, and never
/// retries a failed item on its own.
pub struct Checkout {
    ledger: Arc<Ledger>,
    inventory: Arc<Inventory>,
    allocator: AllocatorRef,
    events: EventSender,
    config: CheckoutConfig,
}

enum ItemOutcome {
    Acquired(Box<OwnedNumber>),
    Failed(String),
    OutOfFunds,
}

impl Checkout {
    pub fn new(
        ledger: Arc<Ledger>,
        inventory: Arc<Inventory>,
        allocator: AllocatorRef,
        events: EventSender,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            ledger,
            inventory,
            allocator,
            events,
            config,
        }
    }

    /// Runs the cart on a dedicated worker and returns immediately.
    pub fn spawn(self: &Arc<Self>, cart: Cart) -> PurchaseHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let checkout = Arc::clone(self);
        let worker = tokio::spawn(async move { checkout.run_with_cancel(cart, cancel_rx).await });
        PurchaseHandle {
            cancel: cancel_tx,
            worker,
        }
    }

    /// Processes the cart to completion in the calling task. The report is
    /// also published as a `PurchaseCompleted` event.
    pub async fn run(&self, cart: Cart) -> PurchaseReport {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(cart, cancel_rx).await
    }

    async fn run_with_cancel(
        &self,
        cart: Cart,
        cancel: watch::Receiver<bool>,
    ) -> PurchaseReport {
        let items = cart.into_items();
        let total = items.len();
        let mut report = PurchaseReport {
            succeeded: Vec::new(),
            failed: Vec::new(),
            total_spent: Decimal::ZERO,
            aborted: None,
        };
        tracing::info!(items = total, "purchase run started");

        for (index, listing) in items.into_iter().enumerate() {
            if *cancel.borrow() {
                tracing::info!(index, "purchase run cancelled");
                report.aborted = Some(AbortReason::Cancelled { index });
                break;
            }

            match self.process_item(&listing).await {
                ItemOutcome::Acquired(number) => {
                    report.total_spent += listing.unit_price;
                    report.succeeded.push(*number);
                    self.progress(index, total, PurchasePhase::Acquired, &listing);
                }
                ItemOutcome::Failed(reason) => {
                    report.failed.push(FailedItem {
                        listing: listing.clone(),
                        reason,
                    });
                    self.progress(index, total, PurchasePhase::Failed, &listing);
                }
                ItemOutcome::OutOfFunds => {
                    report.aborted = Some(AbortReason::InsufficientFunds { index });
                    self.progress(index, total, PurchasePhase::Aborted, &listing);
                    break;
                }
            }
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            spent = %report.total_spent,
            "purchase run finished"
        );
        self.events.emit(EngineEvent::PurchaseCompleted(report.clone()));
        report
    }

    async fn process_item(&self, listing: &Listing) -> ItemOutcome {
        let price = match Amount::try_from(listing.unit_price) {
            Ok(price) => price,
            Err(err) => return ItemOutcome::Failed(err.to_string()),
        };

        match self
            .ledger
            .debit(price, format!("purchase:{}", listing.id))
            .await
        {
            Ok(_) => {}
            Err(EngineError::InsufficientFunds {
                required,
                available,
            }) => {
                tracing::warn!(
                    listing = %listing.id,
                    %required,
                    %available,
                    "insufficient funds, aborting remaining cart"
                );
                return ItemOutcome::OutOfFunds;
            }
            Err(other) => return ItemOutcome::Failed(other.to_string()),
        }

        let assignment = match timeout(
            self.config.acquire_timeout,
            self.allocator.acquire(listing),
        )
        .await
        {
            Ok(Ok(assignment)) => assignment,
            Ok(Err(err)) => return self.refund(price, listing, err.to_string()).await,
            Err(_) => {
                return self
                    .refund(price, listing, "acquisition timed out".to_string())
                    .await;
            }
        };

        let number = OwnedNumber::from_assignment(listing, assignment, Utc::now());
        if let Err(err) = self.inventory.add(number.clone()).await {
            return self.refund(price, listing, err.to_string()).await;
        }
        ItemOutcome::Acquired(Box::new(number))
    }

    async fn refund(&self, price: Amount, listing: &Listing, reason: String) -> ItemOutcome {
        self.ledger
            .credit(price, format!("refund:{}", listing.id))
            .await;
        tracing::warn!(listing = %listing.id, reason = %reason, "item failed, price refunded");
        ItemOutcome::Failed(reason)
    }

    fn progress(&self, index: usize, total: usize, phase: PurchasePhase, listing: &Listing) {
        let percent = (((index + 1) * 100) / total.max(1)) as u8;
        self.events.emit(EngineEvent::PurchaseProgress(ProgressEvent {
            index,
            total,
            percent,
            phase,
            listing_id: listing.id.clone(),
        }));
    }
}

/// Handle to a purchase run executing on its own worker.
pub struct PurchaseHandle {
    cancel: watch::Sender<bool>,
    worker: JoinHandle<PurchaseReport>,
}

impl PurchaseHandle {
    /// Requests cancellation. Takes effect before the next item starts;
    /// the item in flight is allowed to finish and stays committed.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Waits for the report without a bound. Safe in practice because every
    /// item is capped by the acquire timeout, so a run lasts at most
    /// `cart.len()` timeouts; control flows that must never stall should
    /// still prefer [`Self::wait_timeout`].
    pub async fn wait(self) -> Option<PurchaseReport> {
        match self.worker.await {
            Ok(report) => Some(report),
            Err(err) => {
                tracing::error!(error = %err, "purchase worker failed");
                None
            }
        }
    }

    /// Waits for the report, at most `limit`. On timeout the worker keeps
    /// running detached and its report still arrives on the event channel.
    pub async fn wait_timeout(self, limit: Duration) -> Option<PurchaseReport> {
        match timeout(limit, self.worker).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "purchase worker failed");
                None
            }
            Err(_) => None,
        }
    }
}

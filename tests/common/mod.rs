use async_trait::async_trait;
use numwatch::domain::code::RawCode;
use numwatch::domain::listing::{Listing, ListingId};
use numwatch::domain::number::{OwnedNumber, PhoneAssignment};
use numwatch::domain::ports::Allocator;
use numwatch::error::EngineError;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const CATALOG_HEADER: [&str; 7] = [
    "id",
    "service",
    "country",
    "provider",
    "unit_price",
    "quality_score",
    "success_rate_hint",
];

/// Writes a catalog of `rows` listings with ascending prices, so "the N
/// cheapest" is always the first N ids.
pub fn generate_catalog(path: &Path, rows: usize) -> Result<(), csv::Error> {
    let file = std::fs::File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(CATALOG_HEADER)?;

    for i in 1..=rows {
        let id = format!("sms_{}", 10_000 + i);
        let cents = 10 + 5 * i;
        let price = format!("{}.{:02}", cents / 100, cents % 100);
        wtr.write_record([
            id.as_str(),
            "Telegram",
            "US",
            "SMS-Activate",
            price.as_str(),
            "88",
            "95",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn listing(id: &str, price: Decimal) -> Listing {
    Listing {
        id: ListingId::new(id),
        service: "Telegram".to_string(),
        country: "US".to_string(),
        provider: "SMS-Activate".to_string(),
        unit_price: price,
        quality_score: 88,
        success_rate_hint: 95,
    }
}

/// Deterministic allocator for integration tests.
///
/// Acquisitions succeed with sequential phone numbers and activation refs
/// unless the listing id is scripted to fail. Code polls return whatever is
/// scripted for the number's listing id, every cycle. Both paths count
/// their calls and honor an optional artificial delay.
#[derive(Default)]
pub struct ScriptedAllocator {
    failing: HashSet<String>,
    codes: Mutex<HashMap<String, Vec<String>>>,
    delay: Option<Duration>,
    sequence: AtomicUsize,
    acquire_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl ScriptedAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the given listing ids to fail acquisition.
    pub fn failing<const N: usize>(ids: [&str; N]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Every poll on a number bought from `listing_id` returns `codes`.
    pub fn serve_codes<const N: usize>(&self, listing_id: &str, codes: [&str; N]) {
        self.codes.lock().unwrap().insert(
            listing_id.to_string(),
            codes.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Allocator for ScriptedAllocator {
    async fn acquire(&self, listing: &Listing) -> Result<PhoneAssignment, EngineError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(listing.id.as_str()) {
            return Err(EngineError::AllocationFailed(format!(
                "listing {} is scripted to fail",
                listing.id
            )));
        }
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(PhoneAssignment {
            phone_value: format!("+1 555 000-{:04}", 1000 + n),
            activation_ref: format!("act_{}", 100_000 + n),
        })
    }

    async fn fetch_codes(&self, number: &OwnedNumber) -> Result<Vec<RawCode>, EngineError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .codes
            .lock()
            .unwrap()
            .get(number.listing_id.as_str())
            .cloned()
            .unwrap_or_default();
        Ok(scripted.into_iter().map(RawCode::new).collect())
    }
}

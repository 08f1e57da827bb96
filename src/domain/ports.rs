use super::code::{RawCode, VerificationCode};
use super::listing::Listing;
use super::number::{OwnedNumber, PhoneAssignment};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// External capability that reserves numbers and delivers their codes.
/// Implemented per provider outside the engine; both calls may block on
/// network I/O and are always invoked behind timeouts.
#[async_trait]
pub trait Allocator: Send + Sync {
    async fn acquire(&self, listing: &Listing) -> Result<PhoneAssignment>;
    async fn fetch_codes(&self, number: &OwnedNumber) -> Result<Vec<RawCode>>;
}

/// Durable home for the owned-number sequence. `load` on a store that has
/// never been written returns an empty sequence, not an error.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn load(&self) -> Result<Vec<OwnedNumber>>;
    async fn persist(&self, numbers: &[OwnedNumber]) -> Result<()>;
}

/// Durable home for the verification-code sequence, same contract as
/// `InventoryStore`.
#[async_trait]
pub trait JournalStore: Send + Sync {
    async fn load(&self) -> Result<Vec<VerificationCode>>;
    async fn persist(&self, codes: &[VerificationCode]) -> Result<()>;
}

pub type AllocatorRef = Arc<dyn Allocator>;
pub type InventoryStoreBox = Box<dyn InventoryStore>;
pub type JournalStoreBox = Box<dyn JournalStore>;

use crate::domain::code::VerificationCode;
use crate::domain::number::OwnedNumber;
use crate::domain::ports::{InventoryStore, JournalStore};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory inventory store.
///
/// Uses `Arc<RwLock<Vec<OwnedNumber>>>` so clones share the same snapshot,
/// which lets a test hand one handle to the engine and keep another to
/// inspect what was persisted. Ideal for tests and throwaway sessions.
#[derive(Default, Clone)]
pub struct InMemoryInventoryStore {
    numbers: Arc<RwLock<Vec<OwnedNumber>>>,
}

impl InMemoryInventoryStore {
    /// Creates a new, empty in-memory inventory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn load(&self) -> Result<Vec<OwnedNumber>> {
        let numbers = self.numbers.read().await;
        Ok(numbers.clone())
    }

    async fn persist(&self, numbers: &[OwnedNumber]) -> Result<()> {
        let mut stored = self.numbers.write().await;
        *stored = numbers.to_vec();
        Ok(())
    }
}

/// A thread-safe in-memory code journal store.
#[derive(Default, Clone)]
pub struct InMemoryJournalStore {
    codes: Arc<RwLock<Vec<VerificationCode>>>,
}

impl InMemoryJournalStore {
    /// Creates a new, empty in-memory journal store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn load(&self) -> Result<Vec<VerificationCode>> {
        let codes = self.codes.read().await;
        Ok(codes.clone())
    }

    async fn persist(&self, codes: &[VerificationCode]) -> Result<()> {
        let mut stored = self.codes.write().await;
        *stored = codes.to_vec();
        Ok(())
    }
}

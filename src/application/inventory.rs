use crate::domain::listing::SortDirection;
use crate::domain::number::{
    NumberFilter, NumberId, NumberSortKey, NumberStatus, OwnedNumber, sort_numbers,
};
use crate::domain::ports::InventoryStoreBox;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

/// Durable record of owned numbers and their lifecycle state.
///
/// Mutations are linearized behind one writer lock and follow
/// clone -> validate -> flush -> commit: the durable store persists the
/// updated snapshot before the in-memory map is swapped, so after a
/// successful call memory and disk agree, and after a failed flush memory
/// is untouched. The reader-visible map lock is only ever held for the
/// clone or the final swap, never across the flush.
pub struct Inventory {
    store: InventoryStoreBox,
    numbers: RwLock<HashMap<NumberId, OwnedNumber>>,
    writer: Mutex<()>,
}

impl Inventory {
    /// Loads the persisted sequence. A store that has never been written
    /// yields an empty inventory, not an error.
    pub async fn load(store: InventoryStoreBox) -> Result<Self> {
        let numbers = store.load().await?;
        tracing::info!(count = numbers.len(), "inventory loaded");
        let map = numbers.into_iter().map(|n| (n.number_id, n)).collect();
        Ok(Self {
            store,
            numbers: RwLock::new(map),
            writer: Mutex::new(()),
        })
    }

    pub async fn add(&self, number: OwnedNumber) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut working = self.numbers.read().await.clone();
        if working.contains_key(&number.number_id) {
            return Err(EngineError::DuplicateId(number.number_id));
        }
        tracing::info!(number = %number.number_id, phone = %number.phone_value, "number added");
        working.insert(number.number_id, number);
        self.flush_and_commit(working).await
    }

    pub async fn transition(&self, id: NumberId, next: NumberStatus) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut working = self.numbers.read().await.clone();
        let number = working.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        number.transition(next)?;
        tracing::info!(number = %id, status = %next, "status transition");
        self.flush_and_commit(working).await
    }

    /// Stamps `last_code_at`. Called by the event consumer when a new code
    /// arrives; the scheduler itself never mutates numbers.
    pub async fn record_code_seen(&self, id: NumberId, at: DateTime<Utc>) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut working = self.numbers.read().await.clone();
        let number = working.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        number.last_code_at = Some(at);
        self.flush_and_commit(working).await
    }

    /// Explicit, user-initiated removal; nothing else deletes numbers.
    pub async fn remove(&self, id: NumberId) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut working = self.numbers.read().await.clone();
        if working.remove(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        tracing::info!(number = %id, "number removed");
        self.flush_and_commit(working).await
    }

    pub async fn get(&self, id: NumberId) -> Option<OwnedNumber> {
        self.numbers.read().await.get(&id).cloned()
    }

    pub async fn contains(&self, id: NumberId) -> bool {
        self.numbers.read().await.contains_key(&id)
    }

    /// The still-present subset of `ids`, in no particular order.
    pub async fn get_many(&self, ids: &[NumberId]) -> Vec<OwnedNumber> {
        let numbers = self.numbers.read().await;
        ids.iter().filter_map(|id| numbers.get(id).cloned()).collect()
    }

    pub async fn list(
        &self,
        filter: &NumberFilter,
        by: NumberSortKey,
        direction: SortDirection,
    ) -> Vec<OwnedNumber> {
        let mut numbers: Vec<OwnedNumber> = {
            let map = self.numbers.read().await;
            map.values().filter(|n| filter.matches(n)).cloned().collect()
        };
        sort_numbers(&mut numbers, by, direction);
        numbers
    }

    /// The full sequence in durable order (acquisition time, then id).
    pub async fn snapshot(&self) -> Vec<OwnedNumber> {
        ordered(&*self.numbers.read().await)
    }

    pub async fn len(&self) -> usize {
        self.numbers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.numbers.read().await.is_empty()
    }

    async fn flush_and_commit(&self, working: HashMap<NumberId, OwnedNumber>) -> Result<()> {
        let snapshot = ordered(&working);
        self.store.persist(&snapshot).await?;
        *self.numbers.write().await = working;
        Ok(())
    }
}

fn ordered(map: &HashMap<NumberId, OwnedNumber>) -> Vec<OwnedNumber> {
    let mut numbers: Vec<OwnedNumber> = map.values().cloned().collect();
    numbers.sort_by(|a, b| {
        a.acquired_at
            .cmp(&b.acquired_at)
            .then_with(|| a.number_id.to_string().cmp(&b.number_id.to_string()))
    });
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::{Listing, ListingId};
    use crate::domain::number::PhoneAssignment;
    use crate::domain::ports::InventoryStore;
    use crate::infrastructure::in_memory::InMemoryInventoryStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn owned(service: &str) -> OwnedNumber {
        let listing = Listing {
            id: ListingId::new("L1"),
            service: service.to_string(),
            country: "US".to_string(),
            provider: "SMS-Activate".to_string(),
            unit_price: dec!(0.15),
            quality_score: 90,
            success_rate_hint: 95,
        };
        let assignment = PhoneAssignment {
            phone_value: "+12025550111".to_string(),
            activation_ref: "act_100001".to_string(),
        };
        OwnedNumber::from_assignment(&listing, assignment, Utc::now())
    }

    async fn inventory() -> (Inventory, InMemoryInventoryStore) {
        let store = InMemoryInventoryStore::new();
        let inventory = Inventory::load(Box::new(store.clone())).await.unwrap();
        (inventory, store)
    }

    #[tokio::test]
    async fn test_add_writes_through() {
        let (inventory, store) = inventory().await;
        let number = owned("Telegram");
        let id = number.number_id;

        inventory.add(number).await.unwrap();
        assert!(inventory.contains(id).await);

        let persisted = store.load().await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].number_id, id);
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate_id() {
        let (inventory, _) = inventory().await;
        let number = owned("Telegram");
        inventory.add(number.clone()).await.unwrap();

        let result = inventory.add(number).await;
        assert!(matches!(result, Err(EngineError::DuplicateId(_))));
        assert_eq!(inventory.len().await, 1);
    }

    #[tokio::test]
    async fn test_illegal_transition_changes_nothing() {
        let (inventory, store) = inventory().await;
        let number = owned("Telegram");
        let id = number.number_id;
        inventory.add(number).await.unwrap();
        inventory.transition(id, NumberStatus::Expired).await.unwrap();

        let result = inventory.transition(id, NumberStatus::Used).await;
        assert!(matches!(
            result,
            Err(EngineError::IllegalTransition { .. })
        ));
        assert_eq!(inventory.get(id).await.unwrap().status, NumberStatus::Expired);

        let persisted = store.load().await.unwrap();
        assert_eq!(persisted[0].status, NumberStatus::Expired);
    }

    #[tokio::test]
    async fn test_transition_unknown_number() {
        let (inventory, _) = inventory().await;
        let result = inventory
            .transition(NumberId::fresh(), NumberStatus::Used)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_is_explicit_and_checked() {
        let (inventory, store) = inventory().await;
        let number = owned("Telegram");
        let id = number.number_id;
        inventory.add(number).await.unwrap();

        inventory.remove(id).await.unwrap();
        assert!(!inventory.contains(id).await);
        assert!(store.load().await.unwrap().is_empty());

        let again = inventory.remove(id).await;
        assert!(matches!(again, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_record_code_seen_stamps_timestamp() {
        let (inventory, _) = inventory().await;
        let number = owned("Telegram");
        let id = number.number_id;
        inventory.add(number).await.unwrap();

        let at = Utc::now();
        inventory.record_code_seen(id, at).await.unwrap();
        assert_eq!(inventory.get(id).await.unwrap().last_code_at, Some(at));
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let (inventory, _) = inventory().await;
        let telegram = owned("Telegram");
        let whatsapp = owned("WhatsApp");
        inventory.add(telegram.clone()).await.unwrap();
        inventory.add(whatsapp.clone()).await.unwrap();
        inventory
            .transition(whatsapp.number_id, NumberStatus::Used)
            .await
            .unwrap();

        let active_only = inventory
            .list(
                &NumberFilter {
                    status: Some(NumberStatus::Active),
                    ..Default::default()
                },
                NumberSortKey::AcquiredAt,
                SortDirection::Descending,
            )
            .await;
        assert_eq!(active_only.len(), 1);
        assert_eq!(active_only[0].number_id, telegram.number_id);
    }

    struct RejectingStore;

    #[async_trait]
    impl crate::domain::ports::InventoryStore for RejectingStore {
        async fn load(&self) -> Result<Vec<OwnedNumber>> {
            Ok(Vec::new())
        }

        async fn persist(&self, _numbers: &[OwnedNumber]) -> Result<()> {
            Err(EngineError::IoError(std::io::Error::other("disk full")))
        }
    }

    #[tokio::test]
    async fn test_failed_flush_leaves_memory_unchanged() {
        let inventory = Inventory::load(Box::new(RejectingStore)).await.unwrap();
        let number = owned("Telegram");
        let id = number.number_id;

        let result = inventory.add(number).await;
        assert!(matches!(result, Err(EngineError::IoError(_))));
        assert!(!inventory.contains(id).await);
        assert!(inventory.is_empty().await);
    }
}

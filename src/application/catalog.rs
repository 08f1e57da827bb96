use crate::domain::listing::{
    Listing, ListingFilter, ListingSortKey, SortDirection, sort_listings,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Immutable view of the catalog at one instant. Cheap to clone; filtering
/// and sorting are pure functions over the captured set and never block on
/// anything.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    listings: Arc<[Listing]>,
    refreshed_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    fn empty() -> Self {
        Self {
            listings: Arc::from(Vec::new()),
            refreshed_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    pub fn filter(&self, filter: &ListingFilter) -> Vec<Listing> {
        self.listings
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect()
    }

    pub fn sorted(&self, by: ListingSortKey, direction: SortDirection) -> Vec<Listing> {
        let mut listings = self.listings.to_vec();
        sort_listings(&mut listings, by, direction);
        listings
    }

    pub fn filter_sorted(
        &self,
        filter: &ListingFilter,
        by: ListingSortKey,
        direction: SortDirection,
    ) -> Vec<Listing> {
        let mut listings = self.filter(filter);
        sort_listings(&mut listings, by, direction);
        listings
    }
}

/// Refreshable listing catalog. A refresh swaps the whole set in one write;
/// readers keep whichever snapshot they took and never see a partial
/// replacement.
#[derive(Debug)]
pub struct Catalog {
    current: RwLock<CatalogSnapshot>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(CatalogSnapshot::empty()),
        }
    }

    pub async fn refresh(&self, listings: Vec<Listing>) -> CatalogSnapshot {
        let snapshot = CatalogSnapshot {
            listings: listings.into(),
            refreshed_at: Utc::now(),
        };
        *self.current.write().await = snapshot.clone();
        tracing::info!(listings = snapshot.len(), "catalog refreshed");
        snapshot
    }

    pub async fn snapshot(&self) -> CatalogSnapshot {
        self.current.read().await.clone()
    }
}

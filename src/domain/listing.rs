use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Opaque catalog identifier for a purchasable listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A purchasable catalog entry representing one acquirable number.
///
/// Immutable once issued by the catalog; a refresh replaces the whole set.
/// `quality_score` and `success_rate_hint` are 0-100 percentages reported by
/// the marketplace, advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub service: String,
    pub country: String,
    pub provider: String,
    pub unit_price: Decimal,
    pub quality_score: u8,
    pub success_rate_hint: u8,
}

/// An ordered purchase intent. Duplicates are allowed; items have no
/// identity beyond their position.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Vec<Listing>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listing: Listing) {
        self.items.push(listing);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Listing] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Listing> {
        self.items
    }

    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(|l| l.unit_price).sum()
    }
}

impl FromIterator<Listing> for Cart {
    fn from_iter<T: IntoIterator<Item = Listing>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Filter criteria over catalog listings. `None` fields match everything;
/// a string field equal to `"all"` (any case) is the same as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    pub service: Option<String>,
    pub country: Option<String>,
    pub provider: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        field_matches(&self.service, &listing.service)
            && field_matches(&self.country, &listing.country)
            && field_matches(&self.provider, &listing.provider)
            && self.min_price.is_none_or(|min| listing.unit_price >= min)
            && self.max_price.is_none_or(|max| listing.unit_price <= max)
    }

    /// Lenient price-bound parsing: input that does not parse as a decimal
    /// (including the empty string) becomes "no bound" rather than an error.
    pub fn price_range_lenient(min: &str, max: &str) -> (Option<Decimal>, Option<Decimal>) {
        (parse_bound(min), parse_bound(max))
    }
}

fn parse_bound(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}

fn field_matches(wanted: &Option<String>, actual: &str) -> bool {
    match wanted {
        Some(w) => w.eq_ignore_ascii_case("all") || w == actual,
        None => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSortKey {
    Price,
    QualityScore,
    SuccessRate,
    Service,
    Country,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

pub fn sort_listings(listings: &mut [Listing], by: ListingSortKey, direction: SortDirection) {
    listings.sort_by(|a, b| {
        let ordering = match by {
            ListingSortKey::Price => a.unit_price.cmp(&b.unit_price),
            ListingSortKey::QualityScore => a.quality_score.cmp(&b.quality_score),
            ListingSortKey::SuccessRate => a.success_rate_hint.cmp(&b.success_rate_hint),
            ListingSortKey::Service => a.service.cmp(&b.service),
            ListingSortKey::Country => a.country.cmp(&b.country),
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

/// Stable tie-break used by catalog views: price, then id.
pub fn price_then_id(a: &Listing, b: &Listing) -> Ordering {
    a.unit_price
        .cmp(&b.unit_price)
        .then_with(|| a.id.as_str().cmp(b.id.as_str()))
}

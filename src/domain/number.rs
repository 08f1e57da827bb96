use crate::domain::listing::{Listing, ListingId, SortDirection};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Globally unique identifier for an acquired number. Minted fresh per
/// successful acquisition, so buying the same listing twice yields two
/// distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumberId(Uuid);

impl NumberId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NumberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NumberId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of an owned number.
///
/// Legal transitions: `Active -> TelegramReady`, `Active -> Used`,
/// `TelegramReady -> Used`, and any non-expired state `-> Expired`.
/// `Expired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberStatus {
    Active,
    TelegramReady,
    Used,
    Expired,
}

impl NumberStatus {
    pub fn can_transition_to(self, next: NumberStatus) -> bool {
        use NumberStatus::*;
        match (self, next) {
            (Active, TelegramReady) | (Active, Used) | (TelegramReady, Used) => true,
            (Expired, _) => false,
            (_, Expired) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == NumberStatus::Expired
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NumberStatus::Active => "active",
            NumberStatus::TelegramReady => "telegram_ready",
            NumberStatus::Used => "used",
            NumberStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for NumberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumberStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(NumberStatus::Active),
            "telegram_ready" => Ok(NumberStatus::TelegramReady),
            "used" => Ok(NumberStatus::Used),
            "expired" => Ok(NumberStatus::Expired),
            other => Err(EngineError::ValidationError(format!(
                "unknown number status: {other}"
            ))),
        }
    }
}

/// What an allocator hands back for a successful acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneAssignment {
    pub phone_value: String,
    /// Provider-side reference for the activation, required when fetching
    /// codes for this number later.
    pub activation_ref: String,
}

/// An acquired number and its lifecycle state. Created only by a successful
/// purchase step; mutated only through the inventory's explicit operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedNumber {
    pub number_id: NumberId,
    pub listing_id: ListingId,
    pub phone_value: String,
    pub provider: String,
    pub service: String,
    pub country: String,
    pub unit_price: Decimal,
    pub activation_ref: String,
    pub acquired_at: DateTime<Utc>,
    pub status: NumberStatus,
    pub last_code_at: Option<DateTime<Utc>>,
}

impl OwnedNumber {
    /// Synthesizes a fresh `Active` number from a listing and the
    /// allocator's assignment.
    pub fn from_assignment(
        listing: &Listing,
        assignment: PhoneAssignment,
        acquired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            number_id: NumberId::fresh(),
            listing_id: listing.id.clone(),
            phone_value: assignment.phone_value,
            provider: listing.provider.clone(),
            service: listing.service.clone(),
            country: listing.country.clone(),
            unit_price: listing.unit_price,
            activation_ref: assignment.activation_ref,
            acquired_at,
            status: NumberStatus::Active,
            last_code_at: None,
        }
    }

    pub fn transition(&mut self, next: NumberStatus) -> Result<(), EngineError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            Ok(())
        } else {
            Err(EngineError::IllegalTransition {
                from: self.status,
                to: next,
            })
        }
    }
}

/// Weak reference held in the scheduler's watch set; the number itself stays
/// owned by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonitorHandle {
    pub number_id: NumberId,
    pub provider: String,
}

impl From<&OwnedNumber> for MonitorHandle {
    fn from(number: &OwnedNumber) -> Self {
        Self {
            number_id: number.number_id,
            provider: number.provider.clone(),
        }
    }
}

/// Filter criteria over owned numbers. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberFilter {
    pub status: Option<NumberStatus>,
    pub service: Option<String>,
}

impl NumberFilter {
    pub fn matches(&self, number: &OwnedNumber) -> bool {
        self.status.is_none_or(|s| number.status == s)
            && self
                .service
                .as_ref()
                .is_none_or(|s| s.eq_ignore_ascii_case("all") || s == &number.service)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberSortKey {
    AcquiredAt,
    Service,
    Country,
    Status,
    Price,
}

pub fn sort_numbers(numbers: &mut [OwnedNumber], by: NumberSortKey, direction: SortDirection) {
    numbers.sort_by(|a, b| {
        let ordering = match by {
            NumberSortKey::AcquiredAt => a.acquired_at.cmp(&b.acquired_at),
            NumberSortKey::Service => a.service.cmp(&b.service),
            NumberSortKey::Country => a.country.cmp(&b.country),
            NumberSortKey::Status => a.status.as_str().cmp(b.status.as_str()),
            NumberSortKey::Price => a.unit_price.cmp(&b.unit_price),
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

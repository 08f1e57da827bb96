use crate::domain::number::{NumberId, OwnedNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Width of the dedupe time bucket, in seconds. Successive polling cycles
/// that keep returning a still-pending code fall into one bucket and
/// collapse into a single journal row; the same code re-sent much later
/// lands in a new bucket and records again.
pub const DEDUPE_BUCKET_SECS: i64 = 600;

/// A code exactly as an allocator reported it, before the engine stamps
/// identity and observation time onto it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCode {
    pub code: String,
}

impl RawCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// A verification code observed on an owned number. Immutable once
/// journaled; `dedupe_key` is its at-most-once identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCode {
    pub number_id: NumberId,
    pub code: String,
    pub provider: String,
    pub service: String,
    pub observed_at: DateTime<Utc>,
    pub dedupe_key: String,
}

impl VerificationCode {
    /// Stamps a raw code with the owning number's identity and the
    /// observation instant, deriving the dedupe key from both.
    pub fn observed(number: &OwnedNumber, raw: RawCode, observed_at: DateTime<Utc>) -> Self {
        let dedupe_key = dedupe_key(number.number_id, &raw.code, observed_at);
        Self {
            number_id: number.number_id,
            code: raw.code,
            provider: number.provider.clone(),
            service: number.service.clone(),
            observed_at,
            dedupe_key,
        }
    }
}

/// Derived identity for at-most-once journaling: number, code text, and the
/// time bucket the observation fell into.
pub fn dedupe_key(number_id: NumberId, code: &str, observed_at: DateTime<Utc>) -> String {
    let bucket = observed_at.timestamp().div_euclid(DEDUPE_BUCKET_SECS);
    format!("{number_id}:{code}:{bucket}")
}

/// Filter criteria for journal queries. `None` fields match everything;
/// `limit` caps the newest-first result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeFilter {
    pub number_id: Option<NumberId>,
    pub provider: Option<String>,
    pub service: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl CodeFilter {
    pub fn matches(&self, code: &VerificationCode) -> bool {
        self.number_id.is_none_or(|id| code.number_id == id)
            && self.provider.as_ref().is_none_or(|p| p == &code.provider)
            && self.service.as_ref().is_none_or(|s| s == &code.service)
            && self.since.is_none_or(|since| code.observed_at >= since)
    }
}

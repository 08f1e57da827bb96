use crate::domain::money::{Amount, Balance};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;

pub type TransactionId = u64;

/// One immutable row in the wallet's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: TransactionId,
    pub timestamp: DateTime<Utc>,
    /// Signed: positive for credits, negative for debits.
    pub delta: Decimal,
    pub reason: String,
    pub resulting_balance: Balance,
}

/// The wallet. Sole authority for affordability checks: a debit is
/// pre-checked and applied under one lock, so no caller ever observes a
/// partially applied debit and no debit of this engine drives the balance
/// negative. Callers must not re-derive affordability from a cached
/// balance.
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    balance: Balance,
    entries: Vec<LedgerEntry>,
    next_id: TransactionId,
}

impl LedgerState {
    fn apply(&mut self, delta: Decimal, reason: String) -> TransactionId {
        let id = self.next_id;
        self.next_id += 1;
        self.balance = Balance::new(self.balance.value() + delta);
        self.entries.push(LedgerEntry {
            id,
            timestamp: Utc::now(),
            delta,
            reason,
            resulting_balance: self.balance,
        });
        id
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a ledger already holding `opening`, recorded as an ordinary
    /// credit row so the fold-from-zero contract still holds.
    pub fn with_opening_balance(opening: Amount) -> Self {
        let mut state = LedgerState::default();
        state.apply(opening.value(), "opening balance".to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn balance(&self) -> Balance {
        self.state.lock().await.balance
    }

    pub async fn credit(&self, amount: Amount, reason: impl Into<String>) -> TransactionId {
        let mut state = self.state.lock().await;
        let id = state.apply(amount.value(), reason.into());
        tracing::debug!(tx = id, amount = %amount, balance = %state.balance, "credit");
        id
    }

    pub async fn debit(&self, amount: Amount, reason: impl Into<String>) -> Result<TransactionId> {
        let mut state = self.state.lock().await;
        if !state.balance.covers(amount) {
            return Err(EngineError::InsufficientFunds {
                required: amount.value(),
                available: state.balance.value(),
            });
        }
        let id = state.apply(-amount.value(), reason.into());
        tracing::debug!(tx = id, amount = %amount, balance = %state.balance, "debit");
        Ok(id)
    }

    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().await.entries.clone()
    }
}

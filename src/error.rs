use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::number::{NumberId, NumberStatus};

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },
    #[error("allocation failed: {0}")]
    AllocationFailed(String),
    #[error("provider {0} is blocked by policy")]
    PolicyDenied(String),
    #[error("code fetch timed out")]
    FetchTimeout,
    #[error("duplicate number id {0}")]
    DuplicateId(NumberId),
    #[error("number {0} not found")]
    NotFound(NumberId),
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition {
        from: NumberStatus,
        to: NumberStatus,
    },
    #[error("number {0} is not in the inventory")]
    NotInInventory(NumberId),
    #[error("code already journaled under key {0}")]
    AlreadyExists(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
}

use crate::domain::code::VerificationCode;
use crate::domain::number::OwnedNumber;
use crate::domain::ports::{InventoryStore, JournalStore};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// File name for the owned-number inventory within the data directory.
pub const INVENTORY_FILE: &str = "owned_numbers.json";
/// File name for the verification-code journal within the data directory.
pub const JOURNAL_FILE: &str = "sms_codes.json";

/// A persistent store backed by pretty-printed JSON files.
///
/// Keeps the inventory and the code journal as two documents inside one
/// data directory. Every write lands in a temp file first and is renamed
/// over the live document, so a crash mid-write leaves the previous
/// snapshot intact. A missing file reads as an empty collection; a corrupt
/// one surfaces as an error instead of being silently discarded.
///
/// This struct is thread-safe (`Clone` shares the directory handle).
#[derive(Clone)]
pub struct JsonFileStore {
    dir: Arc<PathBuf>,
}

impl JsonFileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "json store opened");
        Ok(Self { dir: Arc::new(dir) })
    }

    fn read_or_empty<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&path)?;
        // A zero-length file reads as empty rather than as corrupt JSON.
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn replace<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let path = self.dir.join(name);
        let bytes = serde_json::to_vec_pretty(items)?;

        // Temp file in the same directory so the rename stays on one
        // filesystem.
        let mut tmp = NamedTempFile::new_in(self.dir.as_ref())?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        tracing::debug!(file = name, bytes = bytes.len(), "snapshot written");
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<OwnedNumber>> {
        self.read_or_empty(INVENTORY_FILE)
    }

    async fn persist(&self, numbers: &[OwnedNumber]) -> Result<()> {
        self.replace(INVENTORY_FILE, numbers)
    }
}

#[async_trait]
impl JournalStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<VerificationCode>> {
        self.read_or_empty(JOURNAL_FILE)
    }

    async fn persist(&self, codes: &[VerificationCode]) -> Result<()> {
        self.replace(JOURNAL_FILE, codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::code::RawCode;
    use crate::domain::listing::{Listing, ListingId};
    use crate::domain::number::{NumberStatus, PhoneAssignment};
    use crate::error::EngineError;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn sample_number() -> OwnedNumber {
        let listing = Listing {
            id: ListingId::new("L7"),
            service: "WhatsApp".to_string(),
            country: "GB".to_string(),
            provider: "5SIM".to_string(),
            unit_price: dec!(0.40),
            quality_score: 75,
            success_rate_hint: 90,
        };
        let assignment = PhoneAssignment {
            phone_value: "+447700900123".to_string(),
            activation_ref: "act_200077".to_string(),
        };
        OwnedNumber::from_assignment(&listing, assignment, Utc::now())
    }

    #[tokio::test]
    async fn test_missing_files_read_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let numbers: Vec<OwnedNumber> = InventoryStore::load(&store).await.unwrap();
        let codes: Vec<VerificationCode> = JournalStore::load(&store).await.unwrap();
        assert!(numbers.is_empty());
        assert!(codes.is_empty());
    }

    #[tokio::test]
    async fn test_inventory_survives_reopen() {
        let dir = tempdir().unwrap();
        let mut number = sample_number();
        number.status = NumberStatus::TelegramReady;

        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            InventoryStore::persist(&store, std::slice::from_ref(&number))
                .await
                .unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        let loaded = InventoryStore::load(&reopened).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].number_id, number.number_id);
        assert_eq!(loaded[0].status, NumberStatus::TelegramReady);
        assert_eq!(loaded[0].phone_value, "+447700900123");
    }

    #[tokio::test]
    async fn test_persist_replaces_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let number = sample_number();
        let now = Utc::now();
        let first = VerificationCode::observed(&number, RawCode::new("111111"), now);
        let second = VerificationCode::observed(&number, RawCode::new("222222"), now);

        JournalStore::persist(&store, &[first.clone()]).await.unwrap();
        JournalStore::persist(&store, &[first, second]).await.unwrap();

        let loaded = JournalStore::load(&store).await.unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_surfaces_an_error() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join(INVENTORY_FILE), b"{not json").unwrap();

        let result = InventoryStore::load(&store).await;
        assert!(matches!(result, Err(EngineError::SerdeError(_))));
    }

    #[tokio::test]
    async fn test_empty_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join(JOURNAL_FILE), b"").unwrap();

        let codes: Vec<VerificationCode> = JournalStore::load(&store).await.unwrap();
        assert!(codes.is_empty());
    }
}

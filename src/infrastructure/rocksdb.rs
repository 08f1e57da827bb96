use crate::domain::code::VerificationCode;
use crate::domain::number::OwnedNumber;
use crate::domain::ports::{InventoryStore, JournalStore};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

/// Column Family for owned numbers, keyed by number id.
pub const CF_NUMBERS: &str = "numbers";
/// Column Family for journaled codes, keyed by dedupe key.
pub const CF_CODES: &str = "codes";

/// A persistent store implementation using RocksDB.
///
/// Holds the owned-number inventory and the code journal in separate
/// Column Families. Each `persist` call rewrites the whole snapshot in one
/// `WriteBatch`, so removals are reflected and readers never observe a
/// half-applied state.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("numbers" and "codes")
    /// exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_numbers = ColumnFamilyDescriptor::new(CF_NUMBERS, Options::default());
        let cf_codes = ColumnFamilyDescriptor::new(CF_CODES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_numbers, cf_codes])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EngineError::IoError(std::io::Error::other(format!(
                "{name} column family not found"
            )))
        })
    }

    fn load_cf<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        let mut items = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = entry?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    fn rewrite_cf<'a, T, I>(&self, name: &str, items: I) -> Result<()>
    where
        T: serde::Serialize + 'a,
        I: IntoIterator<Item = (Vec<u8>, &'a T)>,
    {
        let cf = self.cf(name)?;
        let mut batch = WriteBatch::default();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _value) = entry?;
            batch.delete_cf(cf, key);
        }
        for (key, item) in items {
            batch.put_cf(cf, key, serde_json::to_vec(item)?);
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for RocksDBStore {
    async fn load(&self) -> Result<Vec<OwnedNumber>> {
        self.load_cf(CF_NUMBERS)
    }

    async fn persist(&self, numbers: &[OwnedNumber]) -> Result<()> {
        self.rewrite_cf(
            CF_NUMBERS,
            numbers
                .iter()
                .map(|n| (n.number_id.to_string().into_bytes(), n)),
        )
    }
}

#[async_trait]
impl JournalStore for RocksDBStore {
    async fn load(&self) -> Result<Vec<VerificationCode>> {
        self.load_cf(CF_CODES)
    }

    async fn persist(&self, codes: &[VerificationCode]) -> Result<()> {
        self.rewrite_cf(
            CF_CODES,
            codes.iter().map(|c| (c.dedupe_key.clone().into_bytes(), c)),
        )
    }
}

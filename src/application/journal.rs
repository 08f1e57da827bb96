use crate::domain::code::{CodeFilter, VerificationCode};
use crate::domain::ports::JournalStoreBox;
use crate::error::{EngineError, Result};
use std::collections::HashSet;
use tokio::sync::{Mutex, RwLock};

/// Durable, de-duplicated log of observed verification codes.
///
/// `append` is the sole enforcement point of the at-most-once guarantee:
/// the dedupe-key check and the insert happen under one writer lock, so
/// overlapping fetch units racing on the same code leave exactly one row.
/// Same flush discipline as the inventory: persist first, commit to memory
/// after.
pub struct CodeJournal {
    store: JournalStoreBox,
    state: RwLock<JournalState>,
    writer: Mutex<()>,
}

#[derive(Debug, Default, Clone)]
struct JournalState {
    codes: Vec<VerificationCode>,
    seen: HashSet<String>,
}

impl CodeJournal {
    /// Loads the persisted sequence, rebuilding the dedupe index from it.
    /// A store that has never been written yields an empty journal.
    pub async fn load(store: JournalStoreBox) -> Result<Self> {
        let codes = store.load().await?;
        tracing::info!(count = codes.len(), "code journal loaded");
        let seen = codes.iter().map(|c| c.dedupe_key.clone()).collect();
        Ok(Self {
            store,
            state: RwLock::new(JournalState { codes, seen }),
            writer: Mutex::new(()),
        })
    }

    /// Records a code. `AlreadyExists` is the dedupe signal, not a fault:
    /// callers watching for genuinely new codes match on it and move on.
    pub async fn append(&self, code: VerificationCode) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut working = self.state.read().await.clone();
        if working.seen.contains(&code.dedupe_key) {
            return Err(EngineError::AlreadyExists(code.dedupe_key));
        }
        working.seen.insert(code.dedupe_key.clone());
        working.codes.push(code);
        self.flush_and_commit(working).await
    }

    /// Matching codes, newest first. `filter.limit` caps the result.
    pub async fn query(&self, filter: &CodeFilter) -> Vec<VerificationCode> {
        let mut matched: Vec<VerificationCode> = {
            let state = self.state.read().await;
            state
                .codes
                .iter()
                .rev()
                .filter(|c| filter.matches(c))
                .cloned()
                .collect()
        };
        matched.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Destructive and irreversible. Only ever runs on an explicit call;
    /// confirmation is the caller's job.
    pub async fn clear(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        let count = self.state.read().await.codes.len();
        tracing::warn!(discarded = count, "clearing code journal");
        self.flush_and_commit(JournalState::default()).await
    }

    pub async fn contains(&self, dedupe_key: &str) -> bool {
        self.state.read().await.seen.contains(dedupe_key)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.codes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.codes.is_empty()
    }

    async fn flush_and_commit(&self, working: JournalState) -> Result<()> {
        self.store.persist(&working.codes).await?;
        *self.state.write().await = working;
        Ok(())
    }
}

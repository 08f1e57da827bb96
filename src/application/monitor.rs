use crate::application::inventory::Inventory;
use crate::application::journal::CodeJournal;
use crate::domain::code::VerificationCode;
use crate::domain::events::{EngineEvent, EventSender, MonitorStatusEvent};
use crate::domain::number::{MonitorHandle, NumberId};
use crate::domain::ports::AllocatorRef;
use crate::error::{EngineError, Result};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};

/// Tunables for the monitoring scheduler.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Default delay between polling cycles.
    pub poll_interval: Duration,
    /// Upper bound on one allocator fetch. A timeout means "no codes this
    /// cycle", never a surfaced error.
    pub fetch_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Polls the allocator for codes on every watched number.
///
/// Each cycle snapshots the watch set, prunes entries whose numbers left
/// the inventory, then runs one timeout-bounded fetch task per number, so a
/// hanging provider call for one number never delays the others. Codes are
/// journaled through [`CodeJournal::append`]; only a genuinely new key is
/// emitted as a `NewCode` event, exactly once. The scheduler never mutates
/// numbers, it only emits events.
pub struct Monitor {
    inventory: Arc<Inventory>,
    journal: Arc<CodeJournal>,
    allocator: AllocatorRef,
    events: EventSender,
    shared: Arc<Shared>,
    runner: Mutex<Option<Runner>>,
    fetch_timeout: Duration,
}

struct Shared {
    watch_list: RwLock<HashMap<NumberId, MonitorHandle>>,
    poll_interval: RwLock<Duration>,
}

struct Runner {
    stop: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl Monitor {
    pub fn new(
        inventory: Arc<Inventory>,
        journal: Arc<CodeJournal>,
        allocator: AllocatorRef,
        events: EventSender,
        config: MonitorConfig,
    ) -> Self {
        Self {
            inventory,
            journal,
            allocator,
            events,
            shared: Arc::new(Shared {
                watch_list: RwLock::new(HashMap::new()),
                poll_interval: RwLock::new(config.poll_interval),
            }),
            runner: Mutex::new(None),
            fetch_timeout: config.fetch_timeout,
        }
    }

    /// Adds a number to the watch set. Only inventory members can be
    /// watched; ownership of the number stays with the inventory.
    pub async fn watch(&self, id: NumberId) -> Result<()> {
        let Some(number) = self.inventory.get(id).await else {
            return Err(EngineError::NotInInventory(id));
        };
        let mut list = self.shared.watch_list.write().await;
        list.insert(id, MonitorHandle::from(&number));
        tracing::info!(number = %id, watching = list.len(), "watch added");
        Ok(())
    }

    /// Removing an unwatched id is a no-op.
    pub async fn unwatch(&self, id: NumberId) {
        let mut list = self.shared.watch_list.write().await;
        if list.remove(&id).is_some() {
            tracing::info!(number = %id, watching = list.len(), "watch removed");
        }
    }

    pub async fn watched(&self) -> Vec<NumberId> {
        self.shared.watch_list.read().await.keys().copied().collect()
    }

    pub async fn watch_count(&self) -> usize {
        self.shared.watch_list.read().await.len()
    }

    /// Takes effect on the next tick, never mid-cycle.
    pub async fn set_poll_interval(&self, interval: Duration) {
        *self.shared.poll_interval.write().await = interval;
        tracing::info!(interval_ms = interval.as_millis() as u64, "poll interval updated");
    }

    /// Starts polling with the given interval. Calling while already
    /// running only updates the interval.
    pub async fn start(&self, poll_interval: Duration) {
        let mut runner = self.runner.lock().await;
        *self.shared.poll_interval.write().await = poll_interval;
        if runner.is_some() {
            tracing::debug!("monitor already running, interval updated");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let polling = PollingLoop {
            inventory: Arc::clone(&self.inventory),
            journal: Arc::clone(&self.journal),
            allocator: Arc::clone(&self.allocator),
            events: self.events.clone(),
            shared: Arc::clone(&self.shared),
            fetch_timeout: self.fetch_timeout,
            stop: stop_rx,
        };
        let task = tokio::spawn(polling.run());
        *runner = Some(Runner {
            stop: stop_tx,
            task,
        });

        let watching = self.shared.watch_list.read().await.len();
        tracing::info!(watching, "monitor started");
        self.events.emit(EngineEvent::MonitorStatus(MonitorStatusEvent::Started {
            watching,
        }));
    }

    /// Stops polling. In-flight fetches finish but their results are
    /// discarded; once this returns, no further events are emitted. Safe to
    /// call any number of times, the second and later calls are no-ops.
    pub async fn stop(&self) {
        let mut runner = self.runner.lock().await;
        let Some(Runner { stop, task }) = runner.take() else {
            tracing::debug!("monitor already stopped");
            return;
        };

        let _ = stop.send(true);
        let abort = task.abort_handle();
        let grace = self.fetch_timeout + Duration::from_secs(2);
        match timeout(grace, task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(error = %err, "monitor loop failed"),
            Err(_) => {
                abort.abort();
                tracing::warn!("monitor loop did not wind down in time, aborted");
            }
        }

        self.events
            .emit(EngineEvent::MonitorStatus(MonitorStatusEvent::Stopped));
        tracing::info!("monitor stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.runner.lock().await.is_some()
    }
}

struct PollingLoop {
    inventory: Arc<Inventory>,
    journal: Arc<CodeJournal>,
    allocator: AllocatorRef,
    events: EventSender,
    shared: Arc<Shared>,
    fetch_timeout: Duration,
    stop: watch::Receiver<bool>,
}

impl PollingLoop {
    async fn run(mut self) {
        let mut last_watching = self.shared.watch_list.read().await.len();
        loop {
            let interval = *self.shared.poll_interval.read().await;
            tokio::select! {
                biased;
                _ = self.stop.changed() => break,
                _ = sleep(interval) => {}
            }
            self.cycle(&mut last_watching).await;
            if *self.stop.borrow() {
                break;
            }
        }
        tracing::debug!("monitor loop wound down");
    }

    async fn cycle(&mut self, last_watching: &mut usize) {
        // Snapshot the watch set, then drop entries whose numbers left the
        // inventory since the last cycle.
        let ids: Vec<NumberId> = {
            let list = self.shared.watch_list.read().await;
            list.keys().copied().collect()
        };
        let numbers = self.inventory.get_many(&ids).await;
        if numbers.len() != ids.len() {
            let keep: HashSet<NumberId> = numbers.iter().map(|n| n.number_id).collect();
            let mut list = self.shared.watch_list.write().await;
            list.retain(|id, _| keep.contains(id));
            tracing::debug!(
                pruned = ids.len() - keep.len(),
                "dropped watch entries no longer in inventory"
            );
        }

        let watching = self.shared.watch_list.read().await.len();
        if watching != *last_watching {
            *last_watching = watching;
            self.events.emit(EngineEvent::MonitorStatus(
                MonitorStatusEvent::WatchListChanged { watching },
            ));
        }

        // One bounded fetch per number; a hung call burns its own task, not
        // the cycle.
        let mut fetches = JoinSet::new();
        for number in numbers {
            let allocator = Arc::clone(&self.allocator);
            let bound = self.fetch_timeout;
            fetches.spawn(async move {
                match timeout(bound, allocator.fetch_codes(&number)).await {
                    Ok(Ok(codes)) => (number, codes),
                    Ok(Err(err)) => {
                        tracing::warn!(number = %number.number_id, error = %err, "code fetch failed");
                        (number, Vec::new())
                    }
                    Err(_) => {
                        tracing::debug!(number = %number.number_id, "code fetch timed out, treating as no codes");
                        (number, Vec::new())
                    }
                }
            });
        }

        while let Some(joined) = fetches.join_next().await {
            let (number, codes) = match joined {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(error = %err, "fetch task failed");
                    continue;
                }
            };
            // Drain the rest but discard everything once stopped.
            if *self.stop.borrow() {
                continue;
            }
            for raw in codes {
                if *self.stop.borrow() {
                    break;
                }
                let code = VerificationCode::observed(&number, raw, Utc::now());
                match self.journal.append(code.clone()).await {
                    Ok(()) => {
                        tracing::info!(
                            number = %code.number_id,
                            code = %code.code,
                            provider = %code.provider,
                            "new verification code"
                        );
                        self.events.emit(EngineEvent::NewCode(code));
                    }
                    Err(EngineError::AlreadyExists(_)) => {}
                    Err(err) => tracing::warn!(error = %err, "failed to journal code"),
                }
            }
        }
    }
}

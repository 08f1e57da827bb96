use crate::domain::code::VerificationCode;
use crate::domain::listing::{Listing, ListingId};
use crate::domain::number::OwnedNumber;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

/// Everything the engine pushes toward a presentation layer, serialized
/// through one ordered channel. The engine never assumes the consumer is
/// thread-safe; it only ever talks through this.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    PurchaseProgress(ProgressEvent),
    PurchaseCompleted(PurchaseReport),
    NewCode(VerificationCode),
    MonitorStatus(MonitorStatusEvent),
}

/// Emitted after each processed cart item, in cart order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Zero-based position of the item in the cart.
    pub index: usize,
    pub total: usize,
    /// Whole-run completion after this item, 0-100.
    pub percent: u8,
    pub phase: PurchasePhase,
    pub listing_id: ListingId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchasePhase {
    Acquired,
    Failed,
    Aborted,
}

/// Outcome of one purchase run. Items past an abort point appear in neither
/// list; for a run that processed every item,
/// `succeeded.len() + failed.len() == cart.len()`.
#[derive(Debug, Clone)]
pub struct PurchaseReport {
    pub succeeded: Vec<OwnedNumber>,
    pub failed: Vec<FailedItem>,
    pub total_spent: Decimal,
    pub aborted: Option<AbortReason>,
}

#[derive(Debug, Clone)]
pub struct FailedItem {
    pub listing: Listing,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The debit for the item at `index` was rejected; the rest of the cart
    /// was not attempted.
    InsufficientFunds { index: usize },
    /// The caller cancelled before the item at `index` started.
    Cancelled { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatusEvent {
    Started { watching: usize },
    Stopped,
    WatchListChanged { watching: usize },
}

pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Sending half of the outward channel. Cheap to clone. `emit` never blocks
/// and never fails: with the presentation side gone the event is dropped
/// with a debug log, engine availability is unaffected.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSender {
    pub fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event channel closed, dropping event");
        }
    }
}

pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_emission_order() {
        let (tx, mut rx) = channel();
        tx.emit(EngineEvent::MonitorStatus(MonitorStatusEvent::Started {
            watching: 2,
        }));
        tx.emit(EngineEvent::MonitorStatus(MonitorStatusEvent::Stopped));

        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::MonitorStatus(MonitorStatusEvent::Started { watching: 2 })
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::MonitorStatus(MonitorStatusEvent::Stopped)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_a_noop() {
        let (tx, rx) = channel();
        drop(rx);
        tx.emit(EngineEvent::MonitorStatus(MonitorStatusEvent::Stopped));
    }
}

//! Application layer containing the engine's moving parts.
//!
//! Each component owns its own state behind `tokio` synchronization and
//! talks to providers and storage only through the ports in
//! `crate::domain::ports`. The `Checkout` and `Monitor` components push
//! their observations out through the event channel instead of holding
//! references to any consumer.

pub mod catalog;
pub mod checkout;
pub mod inventory;
pub mod journal;
pub mod ledger;
pub mod monitor;

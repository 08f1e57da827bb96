//! Domain layer: pure types, lifecycle rules, and the ports the engine's
//! adapters implement. Nothing in here performs I/O.

pub mod code;
pub mod events;
pub mod listing;
pub mod money;
pub mod number;
pub mod ports;

//! Interfaces for moving catalog and inventory data in and out of the
//! engine.

pub mod csv;

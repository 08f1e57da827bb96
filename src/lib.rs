//! Engine for buying SMS numbers and watching them for verification
//! codes.
//!
//! The crate is split into a domain core (types, ports, events), an
//! application layer (ledger, catalog, inventory, checkout, monitor,
//! journal) and infrastructure adapters (stores, provider gateways, CSV
//! interfaces). Binaries wire the layers together; everything else talks
//! through the ports in [`domain::ports`].

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

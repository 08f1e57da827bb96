//! Adapters behind the domain ports: storage backends and provider
//! gateways.

pub mod demo;
pub mod in_memory;
pub mod json_file;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

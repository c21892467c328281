//! Adapters for the domain ports: storage backends, clocks, id generation
//! and the default authorization policy.

pub mod authorization;
pub mod clock;
pub mod ids;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

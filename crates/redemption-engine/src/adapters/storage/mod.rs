//! Storage Adapters
//!
//! Implementations of the `KeyValueStore` trait. The RocksDB adapter lives in
//! `voucher-node` behind its `rocksdb` feature.

mod file;
mod memory;

pub use file::FileBackedKVStore;
pub use memory::InMemoryKVStore;

//! # Node Adapters
//!
//! - `storage` - RocksDB backend and re-exports of the engine's stores
//! - `lock` - Process lock on the data directory

pub mod lock;
pub mod storage;

pub use lock::{DataDirLock, LockError};

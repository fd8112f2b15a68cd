//! # Adapters Module
//!
//! Adapter implementations of the outbound ports.
//!
//! ## Modules
//!
//! - `storage`: In-memory and file-backed key-value stores
//! - `blob`: Signature image stores
//! - `infra`: System clock and OS entropy
//! - `serializer`: Bincode record codec

pub mod blob;
pub mod infra;
pub mod serializer;
pub mod storage;

pub use blob::{FileBlobStore, InMemoryBlobStore};
pub use infra::{OsEntropySource, SystemTimeSource};
pub use serializer::BincodeCodec;
pub use storage::{FileBackedKVStore, InMemoryKVStore};

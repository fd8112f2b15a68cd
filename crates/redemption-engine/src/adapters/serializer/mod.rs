//! Serializer Adapters
//!
//! Value encoding for records persisted in the key-value store.

mod bincode;

pub use self::bincode::BincodeCodec;

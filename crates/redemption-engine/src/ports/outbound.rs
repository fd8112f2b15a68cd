//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the redemption service. The host application
//! picks the implementations:
//!
//! | Port | Production | Testing |
//! |------|------------|---------|
//! | `KeyValueStore` | `RocksDbStore` (voucher-node), `FileBackedKVStore` | `InMemoryKVStore` |
//! | `BlobStore` | `FileBlobStore` | `InMemoryBlobStore` |
//! | `TimeSource` | `SystemTimeSource` | `ManualClock` |
//! | `EntropySource` | `OsEntropySource` | `ScriptedEntropy`, `FailingEntropy` |

use std::sync::Arc;

use crate::domain::entities::{InstanceId, Timestamp};
use crate::domain::errors::{BlobStoreError, EntropyError, KVStoreError};
use crate::domain::signature::{BlobHandle, SignatureImage};

/// Result of a prefix scan: `(key, value)` pairs in ascending key order.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Abstract interface for key-value database operations.
///
/// All methods take `&self`; implementations provide their own interior
/// synchronization so the service can be shared across threads.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check every precondition and apply the batch as one atomic unit.
    ///
    /// No other write may interleave between the checks and the apply. If
    /// any precondition fails nothing is written and the first failing key
    /// is reported.
    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<WriteOutcome, KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// All pairs whose key starts with `prefix`, sorted by key.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError>;
}

/// A put within an atomic batch. Records are never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOperation {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Condition checked by `conditional_batch_write` before applying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The key must not exist.
    Absent { key: Vec<u8> },
    /// The key must exist and hold exactly `value`.
    Equals { key: Vec<u8>, value: Vec<u8> },
    /// The key must hold `value`, or not exist when `value` is `None`.
    Matches { key: Vec<u8>, value: Option<Vec<u8>> },
}

impl Precondition {
    pub fn absent(key: impl Into<Vec<u8>>) -> Self {
        Precondition::Absent { key: key.into() }
    }

    pub fn equals(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Precondition::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(key: impl Into<Vec<u8>>, value: Option<Vec<u8>>) -> Self {
        Precondition::Matches {
            key: key.into(),
            value,
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Precondition::Absent { key }
            | Precondition::Equals { key, .. }
            | Precondition::Matches { key, .. } => key,
        }
    }

    /// Whether `current` (the stored value, if any) satisfies this condition.
    pub fn holds(&self, current: Option<&[u8]>) -> bool {
        match self {
            Precondition::Absent { .. } => current.is_none(),
            Precondition::Equals { value, .. } => current == Some(value.as_slice()),
            Precondition::Matches { value, .. } => current == value.as_deref(),
        }
    }
}

/// Outcome of a conditional batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    /// A precondition on `key` failed; nothing was written.
    Conflict { key: Vec<u8> },
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, WriteOutcome::Committed)
    }
}

/// Evaluates preconditions in order against `read`.
///
/// Returns the key of the first violated precondition. Adapters call this
/// while holding their write guard.
pub fn first_violation<F>(
    preconditions: &[Precondition],
    mut read: F,
) -> Result<Option<Vec<u8>>, KVStoreError>
where
    F: FnMut(&[u8]) -> Result<Option<Vec<u8>>, KVStoreError>,
{
    for pre in preconditions {
        let current = read(pre.key())?;
        if !pre.holds(current.as_deref()) {
            return Ok(Some(pre.key().to_vec()));
        }
    }
    Ok(None)
}

/// Persistent storage for signature images.
pub trait BlobStore: Send + Sync {
    /// Persist an image for `instance` and return its handle.
    ///
    /// Each call produces a distinct handle, even for the same instance.
    fn put(&self, instance: InstanceId, image: &SignatureImage)
        -> Result<BlobHandle, BlobStoreError>;

    /// Remove a blob. Removing a missing blob is not an error.
    fn remove(&self, handle: &BlobHandle) -> Result<(), BlobStoreError>;

    fn exists(&self, handle: &BlobHandle) -> Result<bool, BlobStoreError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in seconds since epoch.
    fn now(&self) -> Timestamp;
}

/// Cryptographically secure randomness for token generation.
///
/// Implementations must fail rather than fall back to a weaker source.
pub trait EntropySource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), EntropyError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        (**self).put(key, value)
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        (**self).atomic_batch_write(operations)
    }

    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<WriteOutcome, KVStoreError> {
        (**self).conditional_batch_write(preconditions, operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        (**self).exists(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        (**self).prefix_scan(prefix)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        (**self).put(key, value)
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        (**self).atomic_batch_write(operations)
    }

    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<WriteOutcome, KVStoreError> {
        (**self).conditional_batch_write(preconditions, operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        (**self).exists(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        (**self).prefix_scan(prefix)
    }
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn put(
        &self,
        instance: InstanceId,
        image: &SignatureImage,
    ) -> Result<BlobHandle, BlobStoreError> {
        (**self).put(instance, image)
    }

    fn remove(&self, handle: &BlobHandle) -> Result<(), BlobStoreError> {
        (**self).remove(handle)
    }

    fn exists(&self, handle: &BlobHandle) -> Result<bool, BlobStoreError> {
        (**self).exists(handle)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

impl<T: EntropySource + ?Sized> EntropySource for Arc<T> {
    fn fill(&self, dest: &mut [u8]) -> Result<(), EntropyError> {
        (**self).fill(dest)
    }
}

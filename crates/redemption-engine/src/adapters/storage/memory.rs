use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{
    first_violation, BatchOperation, KeyValueStore, Precondition, ScanResult, WriteOutcome,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory key-value store.
///
/// A single `RwLock` guards the map; conditional batches check and apply
/// under one write guard. Used by unit tests and the `memory` backend.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut data = self.data.write();
        for op in operations {
            data.insert(op.key, op.value);
        }
        Ok(())
    }

    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<WriteOutcome, KVStoreError> {
        let mut data = self.data.write();
        if let Some(key) = first_violation(&preconditions, |k| Ok(data.get(k).cloned()))? {
            return Ok(WriteOutcome::Conflict { key });
        }
        for op in operations {
            data.insert(op.key, op.value);
        }
        Ok(WriteOutcome::Committed)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        let data = self.data.read();
        let results = data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_scan_sorted_and_bounded() {
        let store = InMemoryKVStore::new();
        store.put(b"b:2", b"two").unwrap();
        store.put(b"a:1", b"x").unwrap();
        store.put(b"b:1", b"one").unwrap();
        store.put(b"c:1", b"y").unwrap();

        let scanned = store.prefix_scan(b"b:").unwrap();
        assert_eq!(
            scanned,
            vec![
                (b"b:1".to_vec(), b"one".to_vec()),
                (b"b:2".to_vec(), b"two".to_vec()),
            ]
        );
    }

    #[test]
    fn test_conditional_conflict_writes_nothing() {
        let store = InMemoryKVStore::new();
        store.put(b"taken", b"1").unwrap();

        let outcome = store
            .conditional_batch_write(
                vec![Precondition::absent(b"taken".to_vec())],
                vec![BatchOperation::put(b"new".to_vec(), b"v".to_vec())],
            )
            .unwrap();

        assert_eq!(
            outcome,
            WriteOutcome::Conflict {
                key: b"taken".to_vec()
            }
        );
        assert!(!store.exists(b"new").unwrap());
    }

    #[test]
    fn test_conditional_commit() {
        let store = InMemoryKVStore::new();
        store.put(b"k", b"old").unwrap();

        let outcome = store
            .conditional_batch_write(
                vec![Precondition::equals(b"k".to_vec(), b"old".to_vec())],
                vec![BatchOperation::put(b"k".to_vec(), b"new".to_vec())],
            )
            .unwrap();

        assert!(outcome.is_committed());
        assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
    }
}

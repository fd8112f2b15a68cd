use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{
    first_violation, BatchOperation, KeyValueStore, Precondition, ScanResult, WriteOutcome,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// File-backed key-value store for deployments without RocksDB.
///
/// The whole map is rewritten on every write through a temp file and a
/// rename. Writes are applied to a copy, persisted, then swapped in, so a
/// failed persist leaves both memory and disk at the previous state.
pub struct FileBackedKVStore {
    data: RwLock<Map>,
    path: PathBuf,
}

impl FileBackedKVStore {
    /// Open (or create) the store at `path`.
    ///
    /// A missing file is an empty store. A truncated or malformed file is
    /// reported as `CorruptionError` rather than silently discarded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();

        let data = match std::fs::File::open(&path) {
            Ok(mut file) => {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).map_err(io_error)?;
                let data = decode(&bytes)?;
                tracing::info!(
                    "[redemption] loaded {} keys from {}",
                    data.len(),
                    path.display()
                );
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("[redemption] no existing store at {}", path.display());
                Map::new()
            }
            Err(e) => return Err(io_error(e)),
        };

        Ok(Self {
            data: RwLock::new(data),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, data: &Map) -> Result<(), KVStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let bytes = encode(data);

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_error)?;

        Ok(())
    }

    /// Apply `operations` to a copy of `current`, persist, then swap.
    fn commit(
        &self,
        current: &mut Map,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        let mut next = current.clone();
        for op in operations {
            next.insert(op.key, op.value);
        }
        self.save(&next)?;
        *current = next;
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: e.to_string(),
    }
}

// Format: repeated [key_len:u32 LE][key][value_len:u32 LE][value]
fn encode(data: &Map) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (key, value) in data {
        bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
        bytes.extend_from_slice(value);
    }
    bytes
}

fn decode(bytes: &[u8]) -> Result<Map, KVStoreError> {
    fn take<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], KVStoreError> {
        let end = cursor
            .checked_add(len)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| KVStoreError::CorruptionError {
                message: format!("truncated record at offset {}", cursor),
            })?;
        let slice = &bytes[*cursor..end];
        *cursor = end;
        Ok(slice)
    }

    fn take_len(bytes: &[u8], cursor: &mut usize) -> Result<usize, KVStoreError> {
        let raw = take(bytes, cursor, 4)?;
        let mut len = [0u8; 4];
        len.copy_from_slice(raw);
        Ok(u32::from_le_bytes(len) as usize)
    }

    let mut data = Map::new();
    let mut cursor = 0;
    while cursor < bytes.len() {
        let key_len = take_len(bytes, &mut cursor)?;
        let key = take(bytes, &mut cursor, key_len)?.to_vec();
        let value_len = take_len(bytes, &mut cursor)?;
        let value = take(bytes, &mut cursor, value_len)?.to_vec();
        data.insert(key, value);
    }
    Ok(data)
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        let mut data = self.data.write();
        self.commit(&mut data, vec![BatchOperation::put(key, value)])
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut data = self.data.write();
        self.commit(&mut data, operations)
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
        self.commit(&mut data, operations)?;
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
    use tempfile::TempDir;

    #[test]
    fn test_reopen_preserves_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");

        {
            let store = FileBackedKVStore::open(&path).unwrap();
            store
                .atomic_batch_write(vec![
                    BatchOperation::put(b"a".to_vec(), b"1".to_vec()),
                    BatchOperation::put(b"b".to_vec(), b"2".to_vec()),
                ])
                .unwrap();
        }

        let reopened = FileBackedKVStore::open(&path).unwrap();
        assert_eq!(reopened.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(reopened.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileBackedKVStore::open(dir.path().join("nope.bin")).unwrap();
        assert!(store.prefix_scan(b"").unwrap().is_empty());
    }

    #[test]
    fn test_truncated_file_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");
        std::fs::write(&path, [5u8, 0, 0, 0, b'a']).unwrap();

        assert!(matches!(
            FileBackedKVStore::open(&path),
            Err(KVStoreError::CorruptionError { .. })
        ));
    }

    #[test]
    fn test_conflict_leaves_disk_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");
        let store = FileBackedKVStore::open(&path).unwrap();
        store.put(b"k", b"v").unwrap();

        let outcome = store
            .conditional_batch_write(
                vec![Precondition::absent(b"k".to_vec())],
                vec![BatchOperation::put(b"other".to_vec(), b"x".to_vec())],
            )
            .unwrap();
        assert!(!outcome.is_committed());

        let reopened = FileBackedKVStore::open(&path).unwrap();
        assert!(!reopened.exists(b"other").unwrap());
    }

    #[test]
    fn test_failed_persist_keeps_memory_state() {
        let dir = TempDir::new().unwrap();
        let parent = dir.path().join("sub");
        let store = FileBackedKVStore::open(parent.join("store.bin")).unwrap();
        // Parent becomes a regular file, so persisting must fail.
        std::fs::write(&parent, b"file").unwrap();

        assert!(store.put(b"k", b"v").is_err());
        assert!(!store.exists(b"k").unwrap());
    }
}

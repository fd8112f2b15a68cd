//! # Node Container
//!
//! Builds the redemption service from `NodeConfig`: picks the storage
//! backend, opens the signature store, and holds the data directory lock for
//! as long as the service lives.
//!
//! ```text
//! NodeConfig ──→ [lock data dir] ──→ [open KV backend] ──→ [open blob store]
//!                                                               ↓
//!                                     RedemptionService<dyn KV, dyn Blob, clock, OS entropy>
//! ```

pub mod config;

pub use config::{ConfigError, NodeConfig, StorageBackend};

use std::sync::Arc;
use std::time::Duration;

use redemption_engine::adapters::{
    FileBackedKVStore, FileBlobStore, InMemoryBlobStore, InMemoryKVStore, OsEntropySource,
    SystemTimeSource,
};
use redemption_engine::{
    BlobStore, BlobStoreError, KVStoreError, KeyValueStore, RedemptionDependencies,
    RedemptionService,
};
use thiserror::Error;
use tracing::info;

use crate::adapters::{DataDirLock, LockError};

/// File name of the file backend's snapshot under the data directory.
pub const STORE_FILE: &str = "store.bin";

/// Directory name of the RocksDB backend under the data directory.
pub const ROCKSDB_DIR: &str = "rocksdb";

/// The service type every backend is erased into.
pub type NodeService = RedemptionService<
    Arc<dyn KeyValueStore>,
    Arc<dyn BlobStore>,
    SystemTimeSource,
    OsEntropySource,
>;

/// Errors raised while assembling the node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("failed to open store: {0}")]
    Storage(#[from] KVStoreError),

    #[error("failed to open signature store: {0}")]
    Blobs(#[from] BlobStoreError),
}

/// The assembled node: service plus the resources it owns.
pub struct NodeContainer {
    service: NodeService,
    config: NodeConfig,
    // Held for the container's lifetime.
    _lock: Option<DataDirLock>,
}

impl NodeContainer {
    /// Open the configured backend. Fails fast if another process holds the
    /// data directory.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;

        let lock = if config.storage_backend.is_persistent() {
            Some(DataDirLock::acquire(&config.data_dir, Duration::ZERO)?)
        } else {
            None
        };

        let (kv_store, blob_store) = open_backend(&config)?;
        let service = RedemptionService::new(
            RedemptionDependencies {
                kv_store,
                blob_store,
                time_source: SystemTimeSource,
                entropy: OsEntropySource,
            },
            config.engine_config(),
        );

        info!(
            backend = %config.storage_backend,
            data_dir = %config.data_dir.display(),
            public_token_status = config.public_token_status,
            "[node] redemption service ready"
        );

        Ok(Self {
            service,
            config,
            _lock: lock,
        })
    }

    pub fn service(&self) -> &NodeService {
        &self.service
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}

type Backend = (Arc<dyn KeyValueStore>, Arc<dyn BlobStore>);

fn open_backend(config: &NodeConfig) -> Result<Backend, NodeError> {
    let kv_store: Arc<dyn KeyValueStore> = match config.storage_backend {
        StorageBackend::Memory => Arc::new(InMemoryKVStore::new()),
        StorageBackend::File => {
            Arc::new(FileBackedKVStore::open(config.data_dir.join(STORE_FILE))?)
        }
        StorageBackend::RocksDb => open_rocksdb(config)?,
    };
    let blob_store: Arc<dyn BlobStore> = match config.storage_backend {
        StorageBackend::Memory => Arc::new(InMemoryBlobStore::new()),
        StorageBackend::File | StorageBackend::RocksDb => {
            Arc::new(FileBlobStore::open(&config.data_dir)?)
        }
    };
    Ok((kv_store, blob_store))
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(config: &NodeConfig) -> Result<Arc<dyn KeyValueStore>, NodeError> {
    use crate::adapters::storage::{RocksDbConfig, RocksDbStore};

    let store = RocksDbStore::open(RocksDbConfig::new(config.data_dir.join(ROCKSDB_DIR)))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(config: &NodeConfig) -> Result<Arc<dyn KeyValueStore>, NodeError> {
    Err(ConfigError::BackendUnavailable(config.storage_backend).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use redemption_engine::{AdministrationApi, NewVoucher, RewardType};
    use redemption_engine::test_utils::admin;
    use tempfile::TempDir;

    fn file_config(dir: &TempDir) -> NodeConfig {
        NodeConfig {
            data_dir: dir.path().to_path_buf(),
            storage_backend: StorageBackend::File,
            ..NodeConfig::default()
        }
    }

    #[test]
    fn test_memory_backend_takes_no_lock() {
        let dir = TempDir::new().unwrap();
        let config = NodeConfig {
            data_dir: dir.path().to_path_buf(),
            storage_backend: StorageBackend::Memory,
            ..NodeConfig::default()
        };
        let _a = NodeContainer::open(config.clone()).unwrap();
        let _b = NodeContainer::open(config).unwrap();
        assert!(!dir.path().join(DataDirLock::LOCK_FILE).exists());
    }

    #[test]
    fn test_file_backend_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let _node = NodeContainer::open(file_config(&dir)).unwrap();

        assert!(matches!(
            NodeContainer::open(file_config(&dir)),
            Err(NodeError::Lock(LockError::AlreadyLocked { .. }))
        ));
    }

    #[test]
    fn test_file_backend_persists_between_opens() {
        let dir = TempDir::new().unwrap();
        let voucher = {
            let node = NodeContainer::open(file_config(&dir)).unwrap();
            node.service()
                .create_voucher(&admin(), NewVoucher::new("Lunch", RewardType::Fixed, 12.5))
                .unwrap()
        };

        let node = NodeContainer::open(file_config(&dir)).unwrap();
        let listed = node.service().list_vouchers(&admin()).unwrap();
        assert_eq!(listed, vec![voucher]);
        assert!(dir.path().join(STORE_FILE).exists());
    }
}

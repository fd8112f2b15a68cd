use crate::domain::entities::InstanceId;
use crate::domain::errors::BlobStoreError;
use crate::domain::signature::{BlobHandle, SignatureImage};
use crate::ports::outbound::BlobStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory blob store for tests and the `memory` backend.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    sequence: AtomicU64,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    pub fn handles(&self) -> Vec<BlobHandle> {
        self.blobs.read().keys().cloned().map(BlobHandle::new).collect()
    }

    pub fn get(&self, handle: &BlobHandle) -> Option<Vec<u8>> {
        self.blobs.read().get(handle.as_str()).cloned()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(
        &self,
        instance: InstanceId,
        image: &SignatureImage,
    ) -> Result<BlobHandle, BlobStoreError> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let handle = format!(
            "mem://signatures/sig_{}_{}.{}",
            instance,
            seq,
            image.format.extension()
        );
        self.blobs.write().insert(handle.clone(), image.bytes.clone());
        Ok(BlobHandle::new(handle))
    }

    fn remove(&self, handle: &BlobHandle) -> Result<(), BlobStoreError> {
        self.blobs.write().remove(handle.as_str());
        Ok(())
    }

    fn exists(&self, handle: &BlobHandle) -> Result<bool, BlobStoreError> {
        Ok(self.blobs.read().contains_key(handle.as_str()))
    }
}

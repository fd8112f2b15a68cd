//! Test doubles and fixtures shared by the engine's unit tests and the
//! workspace integration tests (`test-utils` feature).

use crate::adapters::{InMemoryBlobStore, InMemoryKVStore, OsEntropySource};
use crate::domain::entities::{InstanceId, RewardType, Timestamp, Voucher, VoucherId};
use crate::domain::errors::{BlobStoreError, EntropyError, KVStoreError};
use crate::domain::signature::{BlobHandle, SignatureImage};
use crate::domain::token::{Token, TOKEN_ENTROPY_BYTES};
use crate::domain::value_objects::{EngineConfig, NewVoucher};
use crate::ports::inbound::AdministrationApi;
use crate::ports::outbound::{
    BatchOperation, BlobStore, EntropySource, KeyValueStore, Precondition, ScanResult,
    TimeSource, WriteOutcome,
};
use crate::service::{RedemptionDependencies, RedemptionService};
use parking_lot::Mutex;
use shared_types::CallerIdentity;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Organization used by fixtures.
pub const TEST_ORG: u64 = 1;
/// Another organization, for scoping tests.
pub const OTHER_ORG: u64 = 2;
pub const ADMIN_ID: u64 = 100;
pub const OPERATOR_ID: u64 = 200;

/// Fixed start time for `ManualClock` fixtures.
pub const T0: Timestamp = 1_700_000_000;

/// 1x1 PNG as a data URL.
pub const TINY_PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub fn admin() -> CallerIdentity {
    CallerIdentity::admin(ADMIN_ID, TEST_ORG)
}

pub fn operator() -> CallerIdentity {
    CallerIdentity::operator(OPERATOR_ID, TEST_ORG)
}

pub fn operator_with_id(id: u64) -> CallerIdentity {
    CallerIdentity::operator(id, TEST_ORG)
}

pub fn foreign_admin() -> CallerIdentity {
    CallerIdentity::admin(ADMIN_ID + 1, OTHER_ORG)
}

/// A settable clock.
#[derive(Debug)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

/// Entropy source that always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingEntropy;

impl EntropySource for FailingEntropy {
    fn fill(&self, _dest: &mut [u8]) -> Result<(), EntropyError> {
        Err(EntropyError::Unavailable("entropy source offline".to_string()))
    }
}

/// Entropy source that replays scripted outputs, then counts upward.
///
/// Used to force token collisions deterministically.
#[derive(Debug, Default)]
pub struct ScriptedEntropy {
    script: Mutex<VecDeque<[u8; TOKEN_ENTROPY_BYTES]>>,
    counter: AtomicU64,
}

impl ScriptedEntropy {
    pub fn new(script: Vec<[u8; TOKEN_ENTROPY_BYTES]>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            counter: AtomicU64::new(1),
        }
    }
}

impl EntropySource for ScriptedEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), EntropyError> {
        let mut bytes = [0xEE; TOKEN_ENTROPY_BYTES];
        match self.script.lock().pop_front() {
            Some(scripted) => bytes = scripted,
            None => {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                bytes[..8].copy_from_slice(&n.to_le_bytes());
            }
        }
        let len = dest.len().min(bytes.len());
        dest[..len].copy_from_slice(&bytes[..len]);
        Ok(())
    }
}

/// Token produced by `Token::from_entropy` for a scripted byte pattern.
pub fn scripted_token(byte: u8) -> Token {
    Token::from_entropy(&[byte; TOKEN_ENTROPY_BYTES])
}

/// Blob store whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingBlobStore;

impl BlobStore for FailingBlobStore {
    fn put(&self, _: InstanceId, _: &SignatureImage) -> Result<BlobHandle, BlobStoreError> {
        Err(BlobStoreError::IOError {
            message: "disk full".to_string(),
        })
    }

    fn remove(&self, _: &BlobHandle) -> Result<(), BlobStoreError> {
        Ok(())
    }

    fn exists(&self, _: &BlobHandle) -> Result<bool, BlobStoreError> {
        Ok(false)
    }
}

/// Store wrapper that reports a conflict for the next `n` conditional
/// writes without applying them.
pub struct ContendedKVStore {
    inner: InMemoryKVStore,
    pending_conflicts: AtomicU32,
}

impl ContendedKVStore {
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryKVStore::new(),
            pending_conflicts: AtomicU32::new(conflicts),
        }
    }

    pub fn set_conflicts(&self, n: u32) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }
}

impl KeyValueStore for ContendedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.inner.put(key, value)
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.inner.atomic_batch_write(operations)
    }

    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<WriteOutcome, KVStoreError> {
        let injected = self
            .pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            // First compare-style key: callers treat it as lost contention.
            let key = preconditions
                .iter()
                .find(|p| !matches!(p, Precondition::Absent { .. }))
                .or(preconditions.first())
                .map(|p| p.key().to_vec())
                .unwrap_or_default();
            return Ok(WriteOutcome::Conflict { key });
        }
        self.inner.conditional_batch_write(preconditions, operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.inner.exists(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        self.inner.prefix_scan(prefix)
    }
}

/// Store whose single-key `put` always fails. Batches and reads go
/// through, so fixtures can still be created.
#[derive(Default)]
pub struct FailingPutKVStore {
    inner: InMemoryKVStore,
}

impl FailingPutKVStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for FailingPutKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.inner.get(key)
    }

    fn put(&self, _key: &[u8], _value: &[u8]) -> Result<(), KVStoreError> {
        Err(KVStoreError::IOError {
            message: "read-only file system".to_string(),
        })
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.inner.atomic_batch_write(operations)
    }

    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<WriteOutcome, KVStoreError> {
        self.inner.conditional_batch_write(preconditions, operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.inner.exists(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        self.inner.prefix_scan(prefix)
    }
}

pub type TestService =
    RedemptionService<
        Arc<InMemoryKVStore>,
        Arc<InMemoryBlobStore>,
        Arc<ManualClock>,
        OsEntropySource,
    >;

/// A service over shared in-memory adapters, with handles to inspect them.
pub struct TestHarness {
    pub service: Arc<TestService>,
    pub kv: Arc<InMemoryKVStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let kv = Arc::new(InMemoryKVStore::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let service = RedemptionService::new(
            RedemptionDependencies {
                kv_store: Arc::clone(&kv),
                blob_store: Arc::clone(&blobs),
                time_source: Arc::clone(&clock),
                entropy: OsEntropySource,
            },
            config,
        );
        Self {
            service: Arc::new(service),
            kv,
            blobs,
            clock,
        }
    }

    /// Create a voucher as the fixture admin.
    pub fn voucher(&self, request: NewVoucher) -> Voucher {
        self.service
            .create_voucher(&admin(), request)
            .expect("create voucher")
    }

    /// An active, unlimited, windowless voucher.
    pub fn open_voucher(&self) -> Voucher {
        self.voucher(NewVoucher::new("Free coffee", RewardType::FreeItem, 0.0))
    }

    /// Issue `count` instances and return the first page of the voucher's tokens.
    pub fn issue(&self, voucher_id: VoucherId, count: u32) -> Vec<Token> {
        self.service
            .generate_batch(&admin(), voucher_id, count, None)
            .expect("generate batch");
        self.service
            .list_instances(&admin(), voucher_id, 0, usize::MAX)
            .expect("list instances")
            .instances
            .into_iter()
            .map(|i| i.token)
            .collect()
    }

    /// Issue a single instance and return its token.
    pub fn issue_one(&self, voucher_id: VoucherId) -> Token {
        let receipt = self
            .service
            .generate_batch(&admin(), voucher_id, 1, None)
            .expect("generate batch");
        receipt.tokens_preview[0].clone()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

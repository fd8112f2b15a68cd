//! # Redemption Service
//!
//! The application service implementing `RedemptionApi` and
//! `AdministrationApi`.
//!
//! ## Architecture
//!
//! The service:
//! 1. Checks the caller's role and scopes every lookup to the caller's organization
//! 2. Evaluates validity against freshly loaded state
//! 3. Commits every mutation through `conditional_batch_write` (optimistic
//!    concurrency; no engine-wide lock)
//! 4. Takes all external dependencies by injection
//!
//! All methods take `&self`; share the service across threads with `Arc`.

mod admin;
mod audit;
mod issue;
mod quota;
mod redeem;
mod token;
mod validate;

pub use quota::StoreQuotaAccountant;
pub use token::TokenGenerator;

use crate::adapters::{
    BincodeCodec, InMemoryBlobStore, InMemoryKVStore, OsEntropySource, SystemTimeSource,
};
use crate::domain::entities::{Voucher, VoucherId, VoucherInstance};
use crate::domain::errors::{KVStoreError, RedemptionError};
use crate::domain::token::Token;
use crate::domain::value_objects::{EngineConfig, KeyPrefix};
use crate::ports::outbound::{BlobStore, EntropySource, KeyValueStore, TimeSource};
use serde::de::DeserializeOwned;
use shared_types::{CallerIdentity, OrgId, Role};

/// Roles allowed at the point of sale.
pub(crate) const POINT_OF_SALE: &[Role] = &[Role::Admin, Role::Operator];

/// Roles allowed to manage campaigns.
pub(crate) const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// The voucher redemption service.
pub struct RedemptionService<KV, BS, TS, ES>
where
    KV: KeyValueStore,
    BS: BlobStore,
    TS: TimeSource,
    ES: EntropySource,
{
    /// Key-value store for all persisted records.
    pub(crate) kv_store: KV,
    /// Signature image storage.
    pub(crate) blob_store: BS,
    /// Time source for timestamps and window checks.
    pub(crate) time_source: TS,
    /// Token generator backed by the entropy source.
    pub(crate) tokens: TokenGenerator<ES>,
    /// Service configuration.
    pub(crate) config: EngineConfig,
}

/// Dependencies for RedemptionService
pub struct RedemptionDependencies<KV, BS, TS, ES> {
    pub kv_store: KV,
    pub blob_store: BS,
    pub time_source: TS,
    pub entropy: ES,
}

impl<KV, BS, TS, ES> RedemptionService<KV, BS, TS, ES>
where
    KV: KeyValueStore,
    BS: BlobStore,
    TS: TimeSource,
    ES: EntropySource,
{
    pub fn new(deps: RedemptionDependencies<KV, BS, TS, ES>, config: EngineConfig) -> Self {
        Self {
            kv_store: deps.kv_store,
            blob_store: deps.blob_store,
            time_source: deps.time_source,
            tokens: TokenGenerator::new(deps.entropy),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn kv_store(&self) -> &KV {
        &self.kv_store
    }

    pub fn blob_store(&self) -> &BS {
        &self.blob_store
    }

    /// Quota counts read from this service's store.
    pub fn quota(&self) -> StoreQuotaAccountant<'_, KV> {
        StoreQuotaAccountant::new(&self.kv_store)
    }

    pub(crate) fn authorize(
        caller: &CallerIdentity,
        roles: &[Role],
        operation: &'static str,
    ) -> Result<(), RedemptionError> {
        caller.require_role(roles).map_err(|e| {
            tracing::warn!(
                user = %caller.id,
                org = %caller.org,
                role = %caller.role,
                operation,
                "[redemption] forbidden"
            );
            RedemptionError::from(e)
        })
    }

    pub(crate) fn parse_token(raw: &str) -> Result<Token, RedemptionError> {
        Token::parse_presented(raw)
            .ok_or_else(|| RedemptionError::invalid_request("token is required"))
    }

    pub(crate) fn load_voucher(
        &self,
        org: OrgId,
        id: VoucherId,
    ) -> Result<Option<Loaded<Voucher>>, RedemptionError> {
        self.load(&KeyPrefix::voucher_key(org, id))
    }

    /// Instance and its voucher, scoped to `org`.
    ///
    /// `None` when the token is unknown or belongs to another organization.
    pub(crate) fn load_instance(
        &self,
        token: &Token,
        org: OrgId,
    ) -> Result<Option<LoadedInstance>, RedemptionError> {
        match self.load_instance_unscoped(token)? {
            Some(loaded) if loaded.instance.value.org == org => Ok(Some(loaded)),
            _ => Ok(None),
        }
    }

    /// Instance and its voucher regardless of organization (public lookups).
    pub(crate) fn load_instance_unscoped(
        &self,
        token: &Token,
    ) -> Result<Option<LoadedInstance>, RedemptionError> {
        let Some(instance) = self.load::<VoucherInstance>(&KeyPrefix::instance_key(token))? else {
            return Ok(None);
        };
        let voucher = self
            .load_voucher(instance.value.org, instance.value.voucher_id)?
            .ok_or_else(|| {
                RedemptionError::from(KVStoreError::CorruptionError {
                    message: format!("instance {} has no voucher", instance.value.id),
                })
            })?;
        Ok(Some(LoadedInstance { instance, voucher }))
    }

    pub(crate) fn load<T: DeserializeOwned>(
        &self,
        key: &[u8],
    ) -> Result<Option<Loaded<T>>, RedemptionError> {
        match self.kv_store.get(key)? {
            Some(raw) => {
                let value = BincodeCodec::decode(&raw)?;
                Ok(Some(Loaded { value, raw }))
            }
            None => Ok(None),
        }
    }

    /// Every voucher of `org`, in key order.
    pub(crate) fn org_vouchers(&self, org: OrgId) -> Result<Vec<Voucher>, RedemptionError> {
        self.kv_store
            .prefix_scan(&KeyPrefix::org_vouchers(org))?
            .into_iter()
            .map(|(_, raw)| BincodeCodec::decode(&raw).map_err(RedemptionError::from))
            .collect()
    }
}

impl RedemptionService<InMemoryKVStore, InMemoryBlobStore, SystemTimeSource, OsEntropySource> {
    /// Service with in-memory storage, the system clock and OS entropy.
    pub fn new_in_memory(config: EngineConfig) -> Self {
        Self::new(
            RedemptionDependencies {
                kv_store: InMemoryKVStore::new(),
                blob_store: InMemoryBlobStore::new(),
                time_source: SystemTimeSource,
                entropy: OsEntropySource,
            },
            config,
        )
    }
}

/// A decoded record together with the exact bytes it was read from.
///
/// The raw bytes become the `Equals` precondition of the next write.
#[derive(Debug, Clone)]
pub(crate) struct Loaded<T> {
    pub value: T,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct LoadedInstance {
    pub instance: Loaded<VoucherInstance>,
    pub voucher: Loaded<Voucher>,
}

//! `AdministrationApi` implementation.

use super::{Loaded, RedemptionService, ADMIN_ONLY, POINT_OF_SALE};
use crate::adapters::BincodeCodec;
use crate::domain::entities::{
    LifecycleStatus, Redemption, Scan, Voucher, VoucherId, VoucherInstance,
};
use crate::domain::errors::RedemptionError;
use crate::domain::outcomes::{BatchReceipt, InstancePage, OrgStats, RedemptionEntry, StatusAck};
use crate::domain::token::Token;
use crate::domain::value_objects::{KeyPrefix, NewVoucher};
use crate::ports::inbound::AdministrationApi;
use crate::ports::outbound::{
    BatchOperation, BlobStore, EntropySource, KeyValueStore, Precondition, TimeSource,
    WriteOutcome,
};
use shared_types::CallerIdentity;
use std::collections::HashMap;

impl<KV, BS, TS, ES> RedemptionService<KV, BS, TS, ES>
where
    KV: KeyValueStore,
    BS: BlobStore,
    TS: TimeSource,
    ES: EntropySource,
{
    /// Compare-and-set `record` at `key`, reloading and retrying on conflict.
    ///
    /// `update` maps the current value to its successor.
    fn compare_and_set<T, F>(
        &self,
        key: &[u8],
        update: F,
    ) -> Result<T, RedemptionError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
        F: Fn(&T) -> T,
    {
        let attempts = self.config.max_commit_retries.max(1);
        for _ in 0..attempts {
            let Loaded { value, raw } = self.load::<T>(key)?.ok_or(RedemptionError::NotFound)?;
            let next = update(&value);
            let encoded = BincodeCodec::encode(&next)?;
            if encoded == raw {
                return Ok(next);
            }
            match self.kv_store.conditional_batch_write(
                vec![Precondition::equals(key.to_vec(), raw)],
                vec![BatchOperation::put(key.to_vec(), encoded)],
            )? {
                WriteOutcome::Committed => return Ok(next),
                WriteOutcome::Conflict { .. } => {
                    tracing::debug!("[redemption] status update contention, retrying");
                }
            }
        }
        Err(RedemptionError::StorageFailure {
            message: format!("status update contention: gave up after {} attempts", attempts),
        })
    }

    fn voucher_redemptions(&self, voucher: VoucherId) -> Result<Vec<Redemption>, RedemptionError> {
        self.kv_store
            .prefix_scan(&KeyPrefix::voucher_redemptions(voucher))?
            .into_iter()
            .map(|(_, raw)| BincodeCodec::decode(&raw).map_err(RedemptionError::from))
            .collect()
    }
}

impl<KV, BS, TS, ES> AdministrationApi for RedemptionService<KV, BS, TS, ES>
where
    KV: KeyValueStore,
    BS: BlobStore,
    TS: TimeSource,
    ES: EntropySource,
{
    fn create_voucher(
        &self,
        caller: &CallerIdentity,
        request: NewVoucher,
    ) -> Result<Voucher, RedemptionError> {
        Self::authorize(caller, ADMIN_ONLY, "create_voucher")?;
        request.validate()?;

        let voucher = Voucher {
            id: VoucherId::generate(),
            org: caller.org,
            name: request.name.trim().to_string(),
            reward_type: request.reward_type,
            value: request.value,
            status: request.status,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            max_redemptions_total: request.max_redemptions_total,
            max_redemptions_per_user: request.max_redemptions_per_user,
            created_at: self.time_source.now(),
        };

        let key = KeyPrefix::voucher_key(voucher.org, voucher.id);
        match self.kv_store.conditional_batch_write(
            vec![Precondition::absent(key.clone())],
            vec![BatchOperation::put(key, BincodeCodec::encode(&voucher)?)],
        )? {
            WriteOutcome::Committed => {}
            WriteOutcome::Conflict { .. } => {
                return Err(RedemptionError::StorageFailure {
                    message: "voucher id already in use".to_string(),
                })
            }
        }

        tracing::info!(
            org = %caller.org,
            voucher_id = %voucher.id,
            reward_type = %voucher.reward_type,
            "[redemption] voucher created"
        );
        Ok(voucher)
    }

    fn set_voucher_status(
        &self,
        caller: &CallerIdentity,
        voucher_id: VoucherId,
        status: LifecycleStatus,
    ) -> Result<Voucher, RedemptionError> {
        Self::authorize(caller, ADMIN_ONLY, "set_voucher_status")?;
        let key = KeyPrefix::voucher_key(caller.org, voucher_id);
        let voucher = self.compare_and_set(&key, |v: &Voucher| v.with_status(status))?;

        tracing::info!(
            org = %caller.org,
            voucher_id = %voucher_id,
            status = %status,
            "[redemption] voucher status changed"
        );
        Ok(voucher)
    }

    fn list_vouchers(&self, caller: &CallerIdentity) -> Result<Vec<Voucher>, RedemptionError> {
        Self::authorize(caller, ADMIN_ONLY, "list_vouchers")?;
        let mut vouchers = self.org_vouchers(caller.org)?;
        vouchers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(vouchers)
    }

    fn generate_batch(
        &self,
        caller: &CallerIdentity,
        voucher_id: VoucherId,
        count: u32,
        expiry_days: Option<u32>,
    ) -> Result<BatchReceipt, RedemptionError> {
        Self::authorize(caller, ADMIN_ONLY, "generate_batch")?;
        self.issue_batch(caller, voucher_id, count, expiry_days)
    }

    fn list_instances(
        &self,
        caller: &CallerIdentity,
        voucher_id: VoucherId,
        offset: usize,
        limit: usize,
    ) -> Result<InstancePage, RedemptionError> {
        Self::authorize(caller, ADMIN_ONLY, "list_instances")?;
        self.load_voucher(caller.org, voucher_id)?
            .ok_or(RedemptionError::NotFound)?;

        let prefix = KeyPrefix::voucher_index(voucher_id);
        let index = self.kv_store.prefix_scan(&prefix)?;
        let limit = limit.clamp(1, self.config.max_instance_page);

        let mut instances = Vec::with_capacity(limit.min(index.len()));
        for (key, _) in index.iter().skip(offset).take(limit) {
            let raw_token = std::str::from_utf8(&key[prefix.len()..]).map_err(|e| {
                RedemptionError::StorageFailure {
                    message: format!("malformed instance index key: {}", e),
                }
            })?;
            let token = Token::parse_presented(raw_token).ok_or_else(|| {
                RedemptionError::StorageFailure {
                    message: "empty token in instance index".to_string(),
                }
            })?;
            if let Some(loaded) = self.load::<VoucherInstance>(&KeyPrefix::instance_key(&token))? {
                instances.push(loaded.value);
            }
        }

        Ok(InstancePage {
            voucher_id,
            total: index.len(),
            offset,
            instances,
        })
    }

    fn set_instance_status(
        &self,
        caller: &CallerIdentity,
        token: &str,
        status: LifecycleStatus,
    ) -> Result<StatusAck, RedemptionError> {
        Self::authorize(caller, ADMIN_ONLY, "set_instance_status")?;
        let token = Self::parse_token(token)?;

        // Existence and organization are checked before the write.
        if self.load_instance(&token, caller.org)?.is_none() {
            return Err(RedemptionError::NotFound);
        }
        let key = KeyPrefix::instance_key(&token);
        let updated = self.compare_and_set(&key, |i: &VoucherInstance| i.with_status(status))?;

        tracing::info!(
            org = %caller.org,
            token = %token,
            status = %status,
            "[redemption] instance status changed"
        );
        Ok(StatusAck {
            token,
            status: updated.status,
        })
    }

    fn list_redemptions(
        &self,
        caller: &CallerIdentity,
        limit: usize,
    ) -> Result<Vec<RedemptionEntry>, RedemptionError> {
        Self::authorize(caller, POINT_OF_SALE, "list_redemptions")?;
        let limit = limit.clamp(1, self.config.max_redemption_listing);

        let vouchers: HashMap<VoucherId, Voucher> = self
            .org_vouchers(caller.org)?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();

        let mut records = Vec::new();
        for id in vouchers.keys() {
            records.extend(self.voucher_redemptions(*id)?);
        }
        // UUIDv7 ids sort by creation time.
        records.sort_by(|a, b| b.id.cmp(&a.id));
        records.truncate(limit);

        Ok(records
            .into_iter()
            .filter_map(|r| {
                let voucher = vouchers.get(&r.voucher_id)?;
                Some(RedemptionEntry::new(r, voucher))
            })
            .collect())
    }

    fn list_scans(
        &self,
        caller: &CallerIdentity,
        limit: usize,
    ) -> Result<Vec<Scan>, RedemptionError> {
        Self::authorize(caller, ADMIN_ONLY, "list_scans")?;
        let limit = limit.clamp(1, self.config.max_redemption_listing);

        self.kv_store
            .prefix_scan(&KeyPrefix::org_scans(caller.org))?
            .into_iter()
            .rev()
            .take(limit)
            .map(|(_, raw)| BincodeCodec::decode(&raw).map_err(RedemptionError::from))
            .collect()
    }

    fn stats(&self, caller: &CallerIdentity) -> Result<OrgStats, RedemptionError> {
        Self::authorize(caller, ADMIN_ONLY, "stats")?;
        let vouchers = self.org_vouchers(caller.org)?;

        let mut stats = OrgStats {
            vouchers: vouchers.len() as u64,
            ..OrgStats::default()
        };
        for voucher in &vouchers {
            stats.instances += self
                .kv_store
                .prefix_scan(&KeyPrefix::voucher_index(voucher.id))?
                .len() as u64;
            stats.redeemed += self
                .kv_store
                .prefix_scan(&KeyPrefix::voucher_redemptions(voucher.id))?
                .len() as u64;
        }
        Ok(stats)
    }
}

//! Quota accounting over the Redemption log.

use crate::adapters::BincodeCodec;
use crate::domain::entities::{Redemption, VoucherId};
use crate::domain::errors::RedemptionError;
use crate::domain::quota::QuotaCounter;
use crate::domain::value_objects::KeyPrefix;
use crate::ports::outbound::KeyValueStore;
use shared_types::UserId;

/// Counts redemptions by scanning `r:{voucher_id}:` on every call.
pub struct StoreQuotaAccountant<'a, KV: KeyValueStore> {
    kv_store: &'a KV,
}

impl<'a, KV: KeyValueStore> StoreQuotaAccountant<'a, KV> {
    pub fn new(kv_store: &'a KV) -> Self {
        Self { kv_store }
    }
}

impl<KV: KeyValueStore> QuotaCounter for StoreQuotaAccountant<'_, KV> {
    type Error = RedemptionError;

    fn global_redeemed_count(&self, voucher_id: VoucherId) -> Result<u64, RedemptionError> {
        let records = self
            .kv_store
            .prefix_scan(&KeyPrefix::voucher_redemptions(voucher_id))?;
        Ok(records.len() as u64)
    }

    fn user_redeemed_count(
        &self,
        user_id: UserId,
        voucher_id: VoucherId,
    ) -> Result<u64, RedemptionError> {
        let mut count = 0;
        for (_, raw) in self
            .kv_store
            .prefix_scan(&KeyPrefix::voucher_redemptions(voucher_id))?
        {
            let record: Redemption = BincodeCodec::decode(&raw)?;
            if record.user_id == user_id {
                count += 1;
            }
        }
        Ok(count)
    }
}

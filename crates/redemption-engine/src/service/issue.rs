//! Batch issuance of voucher instances.

use super::RedemptionService;
use crate::adapters::BincodeCodec;
use crate::domain::entities::{Timestamp, VoucherId, VoucherInstance};
use crate::domain::errors::RedemptionError;
use crate::domain::outcomes::BatchReceipt;
use crate::domain::token::Token;
use crate::domain::value_objects::{KeyPrefix, SECONDS_PER_DAY};
use crate::ports::outbound::{
    BatchOperation, BlobStore, EntropySource, KeyValueStore, Precondition, TimeSource,
    WriteOutcome,
};
use shared_types::CallerIdentity;
use std::collections::HashSet;

impl<KV, BS, TS, ES> RedemptionService<KV, BS, TS, ES>
where
    KV: KeyValueStore,
    BS: BlobStore,
    TS: TimeSource,
    ES: EntropySource,
{
    /// Creates `count` instances in a single atomic batch.
    ///
    /// Every instance key carries an `Absent` precondition. If one collides
    /// with an existing token, only that token is regenerated and the whole
    /// batch is retried; collisions never reach the caller.
    pub(crate) fn issue_batch(
        &self,
        caller: &CallerIdentity,
        voucher_id: VoucherId,
        count: u32,
        expiry_days: Option<u32>,
    ) -> Result<BatchReceipt, RedemptionError> {
        if count == 0 || count > self.config.max_batch_size {
            return Err(RedemptionError::invalid_request(format!(
                "count must be between 1 and {}",
                self.config.max_batch_size
            )));
        }
        let days = expiry_days.unwrap_or(self.config.default_expiry_days);
        if days == 0 {
            return Err(RedemptionError::invalid_request(
                "expiry_days must be at least 1",
            ));
        }

        let voucher = self
            .load_voucher(caller.org, voucher_id)?
            .ok_or(RedemptionError::NotFound)?
            .value;

        let now = self.time_source.now();
        let expiry_date = expiry_from(now, days);

        let mut seen = HashSet::with_capacity(count as usize);
        let mut tokens = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tokens.push(self.fresh_token(&mut seen)?);
        }

        let mut collisions = 0;
        let instances = loop {
            let instances: Vec<VoucherInstance> = tokens
                .iter()
                .map(|token| {
                    VoucherInstance::issue(&voucher, token.clone(), Some(expiry_date), now)
                })
                .collect();

            let mut preconditions = Vec::with_capacity(instances.len());
            let mut operations = Vec::with_capacity(instances.len() * 2);
            for instance in &instances {
                let key = KeyPrefix::instance_key(&instance.token);
                preconditions.push(Precondition::absent(key.clone()));
                operations.push(BatchOperation::put(key, BincodeCodec::encode(instance)?));
                operations.push(BatchOperation::put(
                    KeyPrefix::index_key(voucher.id, &instance.token),
                    Vec::<u8>::new(),
                ));
            }

            match self
                .kv_store
                .conditional_batch_write(preconditions, operations)?
            {
                WriteOutcome::Committed => break instances,
                WriteOutcome::Conflict { key } => {
                    collisions += 1;
                    if collisions > self.config.max_token_retries {
                        return Err(RedemptionError::StorageFailure {
                            message: format!(
                                "token collisions: gave up after {} retries",
                                self.config.max_token_retries
                            ),
                        });
                    }
                    tracing::warn!(
                        org = %caller.org,
                        voucher_id = %voucher.id,
                        "[redemption] token collision, regenerating"
                    );
                    let position = tokens
                        .iter()
                        .position(|t| KeyPrefix::instance_key(t) == key)
                        .ok_or_else(|| RedemptionError::StorageFailure {
                            message: "conflict on a key outside the batch".to_string(),
                        })?;
                    tokens[position] = self.fresh_token(&mut seen)?;
                }
            }
        };

        tracing::info!(
            org = %caller.org,
            voucher_id = %voucher.id,
            count,
            expiry_date,
            "[redemption] batch issued"
        );

        Ok(BatchReceipt {
            voucher_id: voucher.id,
            created: instances.len() as u32,
            tokens_preview: instances
                .iter()
                .take(self.config.preview_len)
                .map(|i| i.token.clone())
                .collect(),
            expiry_date,
        })
    }

    /// A token not yet used in this batch.
    fn fresh_token(&self, seen: &mut HashSet<Token>) -> Result<Token, RedemptionError> {
        for _ in 0..=self.config.max_token_retries {
            let token = self.tokens.generate()?;
            if seen.insert(token.clone()) {
                return Ok(token);
            }
        }
        Err(RedemptionError::StorageFailure {
            message: "entropy source keeps repeating tokens".to_string(),
        })
    }
}

fn expiry_from(now: Timestamp, days: u32) -> Timestamp {
    now.saturating_add(u64::from(days).saturating_mul(SECONDS_PER_DAY))
}

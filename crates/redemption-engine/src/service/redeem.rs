//! Exactly-once redemption.
//!
//! ## Commit Protocol
//!
//! Each attempt loads the instance, its voucher and the voucher's redemption
//! fence, evaluates, and commits one conditional batch:
//!
//! | Precondition | Guards against |
//! |--------------|----------------|
//! | `i:{token}` equals loaded bytes | concurrent redeem or status edit of this instance |
//! | `v:{org}:{voucher}` equals loaded bytes | concurrent voucher status edit |
//! | `f:{voucher}` equals loaded fence | any other redemption of the voucher (quota boundary) |
//! | `r:{voucher}:{instance}` absent | a second Redemption for the instance |
//!
//! The batch writes the redeemed instance, the Redemption record and the
//! bumped fence. A conflict re-runs the attempt from fresh state.

use super::RedemptionService;
use crate::adapters::BincodeCodec;
use crate::domain::entities::Redemption;
use crate::domain::errors::RedemptionError;
use crate::domain::outcomes::RedemptionReceipt;
use crate::domain::signature::{BlobHandle, SignatureImage};
use crate::domain::token::Token;
use crate::domain::validity::{evaluate, EvaluationContext, ReasonCode};
use crate::domain::value_objects::KeyPrefix;
use crate::ports::outbound::{
    BatchOperation, BlobStore, EntropySource, KeyValueStore, Precondition, TimeSource,
    WriteOutcome,
};
use shared_types::CallerIdentity;

enum Attempt {
    Done(RedemptionReceipt),
    Retry,
}

impl<KV, BS, TS, ES> RedemptionService<KV, BS, TS, ES>
where
    KV: KeyValueStore,
    BS: BlobStore,
    TS: TimeSource,
    ES: EntropySource,
{
    pub(crate) fn redeem_token(
        &self,
        token: Token,
        caller: &CallerIdentity,
        signature_data_url: Option<&str>,
    ) -> Result<RedemptionReceipt, RedemptionError> {
        let mut signature: Option<BlobHandle> = None;
        let result = self.redeem_with_retries(&token, caller, signature_data_url, &mut signature);

        match &result {
            Ok(receipt) => {
                tracing::info!(
                    org = %caller.org,
                    token = %token,
                    user = %caller.id,
                    signed = receipt.signature_path.is_some(),
                    "[redemption] redeemed"
                );
            }
            Err(e) => {
                if let Some(handle) = signature.take() {
                    self.discard_signature(&handle);
                }
                tracing::info!(
                    org = %caller.org,
                    token = %token,
                    code = e.code(),
                    reason = ?e.reason(),
                    "[redemption] redeem rejected"
                );
            }
        }
        result
    }

    fn redeem_with_retries(
        &self,
        token: &Token,
        caller: &CallerIdentity,
        signature_data_url: Option<&str>,
        signature: &mut Option<BlobHandle>,
    ) -> Result<RedemptionReceipt, RedemptionError> {
        let attempts = self.config.max_commit_retries.max(1);
        for attempt in 0..attempts {
            match self.attempt_redeem(token, caller, signature_data_url, signature, attempt > 0)? {
                Attempt::Done(receipt) => return Ok(receipt),
                Attempt::Retry => {
                    tracing::warn!(
                        org = %caller.org,
                        token = %token,
                        attempt,
                        "[redemption] redeem contention, retrying"
                    );
                }
            }
        }
        Err(RedemptionError::StorageFailure {
            message: format!("redeem contention: gave up after {} attempts", attempts),
        })
    }

    fn attempt_redeem(
        &self,
        token: &Token,
        caller: &CallerIdentity,
        signature_data_url: Option<&str>,
        signature: &mut Option<BlobHandle>,
        contended: bool,
    ) -> Result<Attempt, RedemptionError> {
        let loaded = self
            .load_instance(token, caller.org)?
            .ok_or(RedemptionError::NotFound)?;
        let instance = &loaded.instance.value;
        let voucher = &loaded.voucher.value;

        // Fence before counts: any redemption committed after this read bumps it.
        let fence_key = KeyPrefix::fence_key(voucher.id);
        let fence_raw = self.kv_store.get(&fence_key)?;
        let fence = decode_fence(fence_raw.as_deref())?;

        let now = self.time_source.now();
        let ctx = EvaluationContext {
            instance,
            voucher,
            caller: Some(caller.id),
            now,
        };
        let verdict = evaluate(&ctx, &self.quota())?;
        if !verdict.valid {
            if contended && verdict.reason == ReasonCode::AlreadyRedeemed {
                return Err(RedemptionError::AlreadyRedeemed);
            }
            return Err(RedemptionError::InvalidState {
                reason: verdict.reason,
            });
        }

        if signature.is_none() {
            if let Some(url) = signature_data_url {
                let image = SignatureImage::from_data_url(url)?;
                *signature = Some(self.blob_store.put(instance.id, &image)?);
            }
        }

        let Some(redeemed) = instance.with_redemption(caller.id, now, signature.clone()) else {
            return Err(RedemptionError::AlreadyRedeemed);
        };
        let record = Redemption::for_instance(&redeemed, caller.id, now);

        let instance_key = KeyPrefix::instance_key(token);
        let redemption_key = KeyPrefix::redemption_key(voucher.id, instance.id);
        let preconditions = vec![
            Precondition::equals(instance_key.clone(), loaded.instance.raw.clone()),
            Precondition::equals(
                KeyPrefix::voucher_key(voucher.org, voucher.id),
                loaded.voucher.raw.clone(),
            ),
            Precondition::matches(fence_key.clone(), fence_raw),
            Precondition::absent(redemption_key.clone()),
        ];
        let operations = vec![
            BatchOperation::put(instance_key.clone(), BincodeCodec::encode(&redeemed)?),
            BatchOperation::put(redemption_key.clone(), BincodeCodec::encode(&record)?),
            BatchOperation::put(fence_key, (fence + 1).to_le_bytes().to_vec()),
        ];

        match self
            .kv_store
            .conditional_batch_write(preconditions, operations)?
        {
            WriteOutcome::Committed => Ok(Attempt::Done(RedemptionReceipt {
                redeemed: true,
                token: token.clone(),
                signature_path: redeemed.signature_path,
            })),
            WriteOutcome::Conflict { key } if key == redemption_key => {
                Err(RedemptionError::AlreadyRedeemed)
            }
            WriteOutcome::Conflict { .. } => Ok(Attempt::Retry),
        }
    }

    fn discard_signature(&self, handle: &BlobHandle) {
        if let Err(e) = self.blob_store.remove(handle) {
            tracing::warn!(
                handle = %handle,
                error = %e,
                "[redemption] failed to remove orphaned signature"
            );
        }
    }
}

fn decode_fence(raw: Option<&[u8]>) -> Result<u64, RedemptionError> {
    match raw {
        None => Ok(0),
        Some(bytes) => {
            let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
                RedemptionError::StorageFailure {
                    message: format!("malformed redemption fence ({} bytes)", bytes.len()),
                }
            })?;
            Ok(u64::from_le_bytes(bytes))
        }
    }
}

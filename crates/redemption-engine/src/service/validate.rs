//! `RedemptionApi` implementation: validation and public status.

use super::{RedemptionService, POINT_OF_SALE};
use crate::domain::errors::RedemptionError;
use crate::domain::outcomes::{
    PublicDetails, PublicStatus, RedemptionReceipt, ValidationOutcome, VoucherSummary,
};
use crate::domain::validity::{evaluate, EvaluationContext};
use crate::domain::value_objects::ScanContext;
use crate::ports::inbound::RedemptionApi;
use crate::ports::outbound::{BlobStore, EntropySource, KeyValueStore, TimeSource};
use shared_types::CallerIdentity;

impl<KV, BS, TS, ES> RedemptionApi for RedemptionService<KV, BS, TS, ES>
where
    KV: KeyValueStore,
    BS: BlobStore,
    TS: TimeSource,
    ES: EntropySource,
{
    fn validate(
        &self,
        token: &str,
        caller: &CallerIdentity,
        context: &ScanContext,
    ) -> Result<ValidationOutcome, RedemptionError> {
        Self::authorize(caller, POINT_OF_SALE, "validate")?;
        let token = Self::parse_token(token)?;

        self.record_scan(token.as_str(), caller, context);

        let Some(loaded) = self.load_instance(&token, caller.org)? else {
            tracing::debug!(org = %caller.org, token = %token, "[redemption] validate: not found");
            return Err(RedemptionError::NotFound);
        };

        let instance = &loaded.instance.value;
        let voucher = &loaded.voucher.value;
        let ctx = EvaluationContext {
            instance,
            voucher,
            caller: Some(caller.id),
            now: self.time_source.now(),
        };
        let verdict = evaluate(&ctx, &self.quota())?;

        tracing::debug!(
            org = %caller.org,
            token = %token,
            voucher_id = %voucher.id,
            reason = %verdict.reason,
            "[redemption] validated"
        );

        Ok(ValidationOutcome {
            token,
            valid: verdict.valid,
            reason: verdict.reason,
            voucher: VoucherSummary::from(voucher),
        })
    }

    fn redeem(
        &self,
        token: &str,
        caller: &CallerIdentity,
        signature_data_url: Option<&str>,
    ) -> Result<RedemptionReceipt, RedemptionError> {
        Self::authorize(caller, POINT_OF_SALE, "redeem")?;
        let token = Self::parse_token(token)?;
        self.redeem_token(token, caller, signature_data_url)
    }

    fn public_status(&self, token: &str) -> Result<PublicStatus, RedemptionError> {
        if !self.config.public_token_status {
            return Err(RedemptionError::Restricted);
        }
        let token = Self::parse_token(token)?;
        let loaded = self
            .load_instance_unscoped(&token)?
            .ok_or(RedemptionError::NotFound)?;

        let instance = &loaded.instance.value;
        let voucher = &loaded.voucher.value;
        let ctx = EvaluationContext {
            instance,
            voucher,
            caller: None,
            now: self.time_source.now(),
        };
        let verdict = evaluate(&ctx, &self.quota())?;

        Ok(PublicStatus {
            token,
            valid: verdict,
            details: PublicDetails::new(instance, voucher),
        })
    }
}

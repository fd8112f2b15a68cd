//! Scan recording.

use super::RedemptionService;
use crate::adapters::BincodeCodec;
use crate::domain::entities::Scan;
use crate::domain::errors::RedemptionError;
use crate::domain::value_objects::{KeyPrefix, ScanContext};
use crate::ports::outbound::{BlobStore, EntropySource, KeyValueStore, TimeSource};
use shared_types::CallerIdentity;
use uuid::Uuid;

impl<KV, BS, TS, ES> RedemptionService<KV, BS, TS, ES>
where
    KV: KeyValueStore,
    BS: BlobStore,
    TS: TimeSource,
    ES: EntropySource,
{
    /// Append a Scan. Failures are logged and swallowed; they never change
    /// the outcome of the validation that triggered them.
    pub(crate) fn record_scan(&self, token: &str, caller: &CallerIdentity, context: &ScanContext) {
        let scan = Scan {
            id: Uuid::now_v7(),
            org: caller.org,
            token: token.to_string(),
            caller: caller.id,
            ip: context.ip.clone(),
            user_agent: context.user_agent.clone(),
            created_at: self.time_source.now(),
        };

        if let Err(e) = self.write_scan(&scan) {
            tracing::warn!(
                org = %caller.org,
                token,
                error = %e,
                "[redemption] failed to record scan"
            );
        }
    }

    fn write_scan(&self, scan: &Scan) -> Result<(), RedemptionError> {
        let value = BincodeCodec::encode(scan)?;
        self.kv_store
            .put(&KeyPrefix::scan_key(scan.org, scan.id), &value)?;
        Ok(())
    }
}

//! # Value Objects
//!
//! Engine configuration, storage key layout and request value types.

use serde::{Deserialize, Serialize};
use shared_types::OrgId;

use super::entities::{InstanceId, LifecycleStatus, RewardType, Timestamp, VoucherId};
use super::errors::RedemptionError;
use super::token::Token;

/// Engine configuration.
///
/// All values have defaults suitable for production use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Largest batch accepted by `generate_batch` (default: 5000).
    pub max_batch_size: u32,

    /// Tokens echoed back in a batch receipt (default: 10).
    pub preview_len: usize,

    /// Instance expiry used when a batch request gives none (default: 30 days).
    pub default_expiry_days: u32,

    /// Fresh-token attempts per colliding token in a batch (default: 8).
    pub max_token_retries: u32,

    /// Optimistic commit attempts before giving up with `StorageFailure`
    /// (default: 16).
    pub max_commit_retries: u32,

    /// Cap on `list_redemptions` (default: 200).
    pub max_redemption_listing: usize,

    /// Cap on one `list_instances` page (default: 500).
    pub max_instance_page: usize,

    /// Whether anonymous `public_status` lookups are served (default: false).
    pub public_token_status: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 5000,
            preview_len: 10,
            default_expiry_days: 30,
            max_token_retries: 8,
            max_commit_retries: 16,
            max_redemption_listing: 200,
            max_instance_page: 500,
            public_token_status: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_batch_size(mut self, size: u32) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_default_expiry_days(mut self, days: u32) -> Self {
        self.default_expiry_days = days;
        self
    }

    pub fn with_max_token_retries(mut self, retries: u32) -> Self {
        self.max_token_retries = retries;
        self
    }

    pub fn with_max_commit_retries(mut self, retries: u32) -> Self {
        self.max_commit_retries = retries;
        self
    }

    /// Enable or disable anonymous token status lookups.
    pub fn with_public_token_status(mut self, enabled: bool) -> Self {
        self.public_token_status = enabled;
        self
    }
}

/// Seconds in one day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Key prefixes for the key-value store.
///
/// Keys are UTF-8 so that prefix scans iterate in a meaningful order: org ids
/// are fixed-width hex and audit ids are UUIDv7, so scans come back oldest
/// first.
#[derive(Debug, Clone, Copy)]
pub enum KeyPrefix {
    /// `v:{org}:{voucher_id}` -> Voucher
    Voucher,
    /// `i:{token}` -> VoucherInstance
    Instance,
    /// `x:{voucher_id}:{token}` -> empty (voucher to instance index)
    VoucherInstances,
    /// `r:{voucher_id}:{instance_id}` -> Redemption
    Redemption,
    /// `s:{org}:{scan_id}` -> Scan
    Scan,
    /// `f:{voucher_id}` -> u64 redemption fence
    Fence,
}

impl KeyPrefix {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Voucher => b"v:",
            KeyPrefix::Instance => b"i:",
            KeyPrefix::VoucherInstances => b"x:",
            KeyPrefix::Redemption => b"r:",
            KeyPrefix::Scan => b"s:",
            KeyPrefix::Fence => b"f:",
        }
    }

    /// Build a full key with the given suffix.
    pub fn key(&self, suffix: &str) -> Vec<u8> {
        let mut key = self.as_bytes().to_vec();
        key.extend_from_slice(suffix.as_bytes());
        key
    }

    pub fn voucher_key(org: OrgId, id: VoucherId) -> Vec<u8> {
        KeyPrefix::Voucher.key(&format!("{:016x}:{}", org.0, id))
    }

    /// Prefix of every voucher in an organization.
    pub fn org_vouchers(org: OrgId) -> Vec<u8> {
        KeyPrefix::Voucher.key(&format!("{:016x}:", org.0))
    }

    pub fn instance_key(token: &Token) -> Vec<u8> {
        KeyPrefix::Instance.key(token.as_str())
    }

    pub fn index_key(voucher: VoucherId, token: &Token) -> Vec<u8> {
        KeyPrefix::VoucherInstances.key(&format!("{}:{}", voucher, token))
    }

    pub fn voucher_index(voucher: VoucherId) -> Vec<u8> {
        KeyPrefix::VoucherInstances.key(&format!("{}:", voucher))
    }

    /// Derived from the instance id, so one instance has at most one record.
    pub fn redemption_key(voucher: VoucherId, instance: InstanceId) -> Vec<u8> {
        KeyPrefix::Redemption.key(&format!("{}:{}", voucher, instance))
    }

    pub fn voucher_redemptions(voucher: VoucherId) -> Vec<u8> {
        KeyPrefix::Redemption.key(&format!("{}:", voucher))
    }

    pub fn scan_key(org: OrgId, scan_id: uuid::Uuid) -> Vec<u8> {
        KeyPrefix::Scan.key(&format!("{:016x}:{}", org.0, scan_id))
    }

    pub fn org_scans(org: OrgId) -> Vec<u8> {
        KeyPrefix::Scan.key(&format!("{:016x}:", org.0))
    }

    pub fn fence_key(voucher: VoucherId) -> Vec<u8> {
        KeyPrefix::Fence.key(&voucher.to_string())
    }
}

/// Request metadata captured with every Scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanContext {
    pub ip: String,
    pub user_agent: String,
}

impl ScanContext {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Administrator input for `create_voucher`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVoucher {
    pub name: String,
    pub reward_type: RewardType,
    pub value: f64,
    #[serde(default = "initial_status")]
    pub status: LifecycleStatus,
    #[serde(default)]
    pub starts_at: Option<Timestamp>,
    #[serde(default)]
    pub ends_at: Option<Timestamp>,
    #[serde(default)]
    pub max_redemptions_total: u32,
    #[serde(default)]
    pub max_redemptions_per_user: u32,
}

fn initial_status() -> LifecycleStatus {
    LifecycleStatus::Active
}

impl NewVoucher {
    pub fn new(name: impl Into<String>, reward_type: RewardType, value: f64) -> Self {
        Self {
            name: name.into(),
            reward_type,
            value,
            status: LifecycleStatus::Active,
            starts_at: None,
            ends_at: None,
            max_redemptions_total: 0,
            max_redemptions_per_user: 0,
        }
    }

    pub fn with_status(mut self, status: LifecycleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_window(mut self, starts_at: Option<Timestamp>, ends_at: Option<Timestamp>) -> Self {
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self
    }

    pub fn with_limits(mut self, total: u32, per_user: u32) -> Self {
        self.max_redemptions_total = total;
        self.max_redemptions_per_user = per_user;
        self
    }

    /// Rejects blank names, non-finite or negative values and inverted windows.
    pub fn validate(&self) -> Result<(), RedemptionError> {
        if self.name.trim().is_empty() {
            return Err(RedemptionError::invalid_request("name is required"));
        }
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(RedemptionError::invalid_request(
                "value must be a non-negative number",
            ));
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if start > end {
                return Err(RedemptionError::invalid_request(
                    "starts_at must not be after ends_at",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_batch_size, 5000);
        assert_eq!(config.preview_len, 10);
        assert_eq!(config.default_expiry_days, 30);
        assert!(!config.public_token_status);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_public_token_status(true)
            .with_max_commit_retries(2);
        assert!(config.public_token_status);
        assert_eq!(config.max_commit_retries, 2);
    }

    #[test]
    fn test_org_keys_are_fixed_width() {
        let v = VoucherId::generate();
        let key = KeyPrefix::voucher_key(OrgId(255), v);
        assert!(key.starts_with(&KeyPrefix::org_vouchers(OrgId(255))));
        assert!(!key.starts_with(&KeyPrefix::org_vouchers(OrgId(25))));
        assert_eq!(
            KeyPrefix::org_vouchers(OrgId(255)),
            b"v:00000000000000ff:".to_vec()
        );
    }

    #[test]
    fn test_redemption_key_within_voucher_prefix() {
        let v = VoucherId::generate();
        let i = InstanceId::generate();
        assert!(KeyPrefix::redemption_key(v, i).starts_with(&KeyPrefix::voucher_redemptions(v)));
    }

    #[test]
    fn test_new_voucher_validation() {
        assert!(NewVoucher::new("Coffee", RewardType::Free, 0.0)
            .validate()
            .is_ok());
        assert!(NewVoucher::new("  ", RewardType::Free, 0.0)
            .validate()
            .is_err());
        assert!(NewVoucher::new("x", RewardType::Fixed, f64::NAN)
            .validate()
            .is_err());
        assert!(NewVoucher::new("x", RewardType::Fixed, 5.0)
            .with_window(Some(10), Some(5))
            .validate()
            .is_err());
    }
}

//! # Operation Outcomes
//!
//! Serializable results returned by the inbound ports. These are the shapes
//! callers see; internal records (instances, vouchers) are trimmed down to
//! what each audience may learn.

use serde::{Deserialize, Serialize};
use shared_types::UserId;
use uuid::Uuid;

use super::entities::{
    InstanceId, LifecycleStatus, Redemption, RewardType, Timestamp, Voucher, VoucherId,
    VoucherInstance,
};
use super::signature::BlobHandle;
use super::token::Token;
use super::validity::{ReasonCode, Verdict};

/// Voucher fields shown to an operator during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherSummary {
    pub voucher_id: VoucherId,
    pub name: String,
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    pub value: f64,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
}

impl From<&Voucher> for VoucherSummary {
    fn from(v: &Voucher) -> Self {
        Self {
            voucher_id: v.id,
            name: v.name.clone(),
            reward_type: v.reward_type,
            value: v.value,
            starts_at: v.starts_at,
            ends_at: v.ends_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub token: Token,
    pub valid: bool,
    pub reason: ReasonCode,
    pub voucher: VoucherSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub redeemed: bool,
    pub token: Token,
    pub signature_path: Option<BlobHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub voucher_id: VoucherId,
    pub created: u32,
    /// First tokens of the batch; the rest via `list_instances`.
    pub tokens_preview: Vec<Token>,
    pub expiry_date: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAck {
    pub token: Token,
    pub status: LifecycleStatus,
}

/// One page of a voucher's instances, in stable token order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePage {
    pub voucher_id: VoucherId,
    pub total: usize,
    pub offset: usize,
    pub instances: Vec<VoucherInstance>,
}

/// A Redemption joined with its voucher, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionEntry {
    pub id: Uuid,
    pub token: Token,
    pub instance_id: InstanceId,
    pub voucher_id: VoucherId,
    pub voucher_name: String,
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    pub value: f64,
    pub user_id: UserId,
    pub signature_path: Option<BlobHandle>,
    pub created_at: Timestamp,
}

impl RedemptionEntry {
    pub fn new(record: Redemption, voucher: &Voucher) -> Self {
        Self {
            id: record.id,
            token: record.token,
            instance_id: record.instance_id,
            voucher_id: record.voucher_id,
            voucher_name: voucher.name.clone(),
            reward_type: voucher.reward_type,
            value: voucher.value,
            user_id: record.user_id,
            signature_path: record.signature_path,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgStats {
    pub vouchers: u64,
    pub instances: u64,
    pub redeemed: u64,
}

/// Anonymous status lookup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicStatus {
    pub token: Token,
    pub valid: Verdict,
    pub details: PublicDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicDetails {
    pub name: String,
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    pub value: f64,
    pub voucher_status: LifecycleStatus,
    pub instance_status: LifecycleStatus,
    pub redeemed_at: Option<Timestamp>,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub expiry_date: Option<Timestamp>,
}

impl PublicDetails {
    pub fn new(instance: &VoucherInstance, voucher: &Voucher) -> Self {
        Self {
            name: voucher.name.clone(),
            reward_type: voucher.reward_type,
            value: voucher.value,
            voucher_status: voucher.status,
            instance_status: instance.status,
            redeemed_at: instance.redeemed_at,
            starts_at: voucher.starts_at,
            ends_at: voucher.ends_at,
            expiry_date: instance.expiry_date,
        }
    }
}

//! # Domain Entities
//!
//! Vouchers (campaigns), voucher instances (single-use tokens) and the two
//! append-only audit records, `Scan` and `Redemption`.
//!
//! ## Instance State Machine
//!
//! ```text
//!                 set_status (admin)
//!            ┌──────────────────────────┐
//!            ↓                          │
//! [created] → active ⇄ paused ⇄ disabled
//!              │
//!              └── redeem ──→ active + redeemed_at (terminal, immutable)
//! ```
//!
//! `status` is an operational kill-switch and is orthogonal to redemption:
//! changing it never touches `redeemed_at`, `redeemed_by` or the signature.

use serde::{Deserialize, Serialize};
use shared_types::{OrgId, UserId};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use shared_types::Timestamp;

use super::signature::BlobHandle;
use super::token::Token;

/// Voucher (campaign) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoucherId(pub Uuid);

impl VoucherId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VoucherId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Voucher instance identifier (distinct from the public token).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of reward a voucher grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardType {
    Percent,
    Fixed,
    Free,
    FreeItem,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Percent => "PERCENT",
            RewardType::Fixed => "FIXED",
            RewardType::Free => "FREE",
            RewardType::FreeItem => "FREE_ITEM",
        }
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENT" => Ok(RewardType::Percent),
            "FIXED" => Ok(RewardType::Fixed),
            "FREE" => Ok(RewardType::Free),
            "FREE_ITEM" => Ok(RewardType::FreeItem),
            other => Err(format!("unknown reward type: {}", other)),
        }
    }
}

/// Operational status shared by vouchers and instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Active,
    Paused,
    Disabled,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Active => "active",
            LifecycleStatus::Paused => "paused",
            LifecycleStatus::Disabled => "disabled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleStatus::Active)
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LifecycleStatus::Active),
            "paused" => Ok(LifecycleStatus::Paused),
            "disabled" => Ok(LifecycleStatus::Disabled),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// A reward campaign definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    pub org: OrgId,
    pub name: String,
    pub reward_type: RewardType,
    pub value: f64,
    pub status: LifecycleStatus,
    /// Redemption window start (inclusive).
    pub starts_at: Option<Timestamp>,
    /// Redemption window end (inclusive).
    pub ends_at: Option<Timestamp>,
    /// 0 = unlimited.
    pub max_redemptions_total: u32,
    /// 0 = unlimited.
    pub max_redemptions_per_user: u32,
    pub created_at: Timestamp,
}

impl Voucher {
    pub fn with_status(&self, status: LifecycleStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// A single-use redeemable token derived from a voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherInstance {
    pub id: InstanceId,
    pub voucher_id: VoucherId,
    pub org: OrgId,
    pub token: Token,
    pub status: LifecycleStatus,
    pub redeemed_at: Option<Timestamp>,
    pub redeemed_by: Option<UserId>,
    /// Per-instance deadline fixed at batch generation.
    pub expiry_date: Option<Timestamp>,
    pub signature_path: Option<BlobHandle>,
    pub created_at: Timestamp,
}

impl VoucherInstance {
    /// Creates a fresh, active, unredeemed instance.
    pub fn issue(
        voucher: &Voucher,
        token: Token,
        expiry_date: Option<Timestamp>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: InstanceId::generate(),
            voucher_id: voucher.id,
            org: voucher.org,
            token,
            status: LifecycleStatus::Active,
            redeemed_at: None,
            redeemed_by: None,
            expiry_date,
            signature_path: None,
            created_at: now,
        }
    }

    pub fn is_redeemed(&self) -> bool {
        self.redeemed_at.is_some()
    }

    /// Returns the redeemed successor state, or `None` if already redeemed.
    ///
    /// `redeemed_at` can be set at most once.
    pub fn with_redemption(
        &self,
        by: UserId,
        at: Timestamp,
        signature_path: Option<BlobHandle>,
    ) -> Option<Self> {
        if self.is_redeemed() {
            return None;
        }
        Some(Self {
            redeemed_at: Some(at),
            redeemed_by: Some(by),
            signature_path,
            ..self.clone()
        })
    }

    /// Returns a copy with a new operational status. Redemption fields are kept.
    pub fn with_status(&self, status: LifecycleStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Audit record of a validation attempt. Written on every validate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    /// Time-ordered (UUIDv7).
    pub id: Uuid,
    pub org: OrgId,
    /// Token exactly as presented; may not exist.
    pub token: String,
    pub caller: UserId,
    pub ip: String,
    pub user_agent: String,
    pub created_at: Timestamp,
}

/// Audit record of a successful redemption. Exactly one per redeemed instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// Time-ordered (UUIDv7).
    pub id: Uuid,
    pub instance_id: InstanceId,
    pub voucher_id: VoucherId,
    pub org: OrgId,
    pub token: Token,
    pub user_id: UserId,
    pub signature_path: Option<BlobHandle>,
    pub created_at: Timestamp,
}

impl Redemption {
    /// Builds the audit record for a freshly redeemed instance.
    pub fn for_instance(instance: &VoucherInstance, user_id: UserId, at: Timestamp) -> Self {
        Self {
            id: Uuid::now_v7(),
            instance_id: instance.id,
            voucher_id: instance.voucher_id,
            org: instance.org,
            token: instance.token.clone(),
            user_id,
            signature_path: instance.signature_path.clone(),
            created_at: at,
        }
    }
}

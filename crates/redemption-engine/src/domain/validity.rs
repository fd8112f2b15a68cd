//! # Validity Evaluation
//!
//! Decides whether an instance is redeemable right now, and if not, why.
//!
//! ## Check Order
//!
//! The first failing check wins:
//!
//! | # | Check | Reason |
//! |---|-------|--------|
//! | 1 | Instance status is active | `instance_paused` / `instance_disabled` |
//! | 2 | Voucher status is active | `voucher_paused` / `voucher_disabled` |
//! | 3 | Instance not yet redeemed | `already_redeemed` |
//! | 4 | Window has started | `not_started` |
//! | 5 | Window and instance expiry not passed | `expired` |
//! | 6 | Global quota not exhausted | `limit_total_reached` |
//! | 7 | Caller quota not exhausted | `limit_user_reached` |
//!
//! Quota counts are fetched lazily: only when a limit is configured and every
//! earlier check has passed.

use serde::{Deserialize, Serialize};
use shared_types::UserId;
use std::fmt;

use super::entities::{LifecycleStatus, Timestamp, Voucher, VoucherInstance};
use super::quota::QuotaCounter;

/// Stable reason strings returned by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Ok,
    InstancePaused,
    InstanceDisabled,
    VoucherPaused,
    VoucherDisabled,
    AlreadyRedeemed,
    NotStarted,
    Expired,
    LimitTotalReached,
    LimitUserReached,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Ok => "ok",
            ReasonCode::InstancePaused => "instance_paused",
            ReasonCode::InstanceDisabled => "instance_disabled",
            ReasonCode::VoucherPaused => "voucher_paused",
            ReasonCode::VoucherDisabled => "voucher_disabled",
            ReasonCode::AlreadyRedeemed => "already_redeemed",
            ReasonCode::NotStarted => "not_started",
            ReasonCode::Expired => "expired",
            ReasonCode::LimitTotalReached => "limit_total_reached",
            ReasonCode::LimitUserReached => "limit_user_reached",
        }
    }

    fn for_instance(status: LifecycleStatus) -> Option<Self> {
        match status {
            LifecycleStatus::Active => None,
            LifecycleStatus::Paused => Some(ReasonCode::InstancePaused),
            LifecycleStatus::Disabled => Some(ReasonCode::InstanceDisabled),
        }
    }

    fn for_voucher(status: LifecycleStatus) -> Option<Self> {
        match status {
            LifecycleStatus::Active => None,
            LifecycleStatus::Paused => Some(ReasonCode::VoucherPaused),
            LifecycleStatus::Disabled => Some(ReasonCode::VoucherDisabled),
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    pub reason: ReasonCode,
}

impl Verdict {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: ReasonCode::Ok,
        }
    }

    pub fn rejected(reason: ReasonCode) -> Self {
        Self {
            valid: false,
            reason,
        }
    }
}

/// A single named predicate of the evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityCheck {
    InstanceStatus,
    VoucherStatus,
    NotRedeemed,
    WindowStart,
    WindowEnd,
    TotalQuota,
    UserQuota,
}

/// Checks in the order they are applied.
pub const EVALUATION_ORDER: [ValidityCheck; 7] = [
    ValidityCheck::InstanceStatus,
    ValidityCheck::VoucherStatus,
    ValidityCheck::NotRedeemed,
    ValidityCheck::WindowStart,
    ValidityCheck::WindowEnd,
    ValidityCheck::TotalQuota,
    ValidityCheck::UserQuota,
];

/// State the checks are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub instance: &'a VoucherInstance,
    pub voucher: &'a Voucher,
    /// `None` for anonymous evaluation (public status); skips the user quota.
    pub caller: Option<UserId>,
    pub now: Timestamp,
}

impl<'a> EvaluationContext<'a> {
    /// Earliest of the voucher window end and the instance expiry.
    pub fn effective_expiry(&self) -> Option<Timestamp> {
        match (self.voucher.ends_at, self.instance.expiry_date) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

impl ValidityCheck {
    /// Applies this check. `Ok(Some(reason))` means the check failed.
    pub fn apply<Q: QuotaCounter>(
        &self,
        ctx: &EvaluationContext<'_>,
        counter: &Q,
    ) -> Result<Option<ReasonCode>, Q::Error> {
        let reason = match self {
            ValidityCheck::InstanceStatus => ReasonCode::for_instance(ctx.instance.status),
            ValidityCheck::VoucherStatus => ReasonCode::for_voucher(ctx.voucher.status),
            ValidityCheck::NotRedeemed => ctx
                .instance
                .is_redeemed()
                .then_some(ReasonCode::AlreadyRedeemed),
            ValidityCheck::WindowStart => match ctx.voucher.starts_at {
                Some(start) if ctx.now < start => Some(ReasonCode::NotStarted),
                _ => None,
            },
            ValidityCheck::WindowEnd => match ctx.effective_expiry() {
                Some(end) if ctx.now > end => Some(ReasonCode::Expired),
                _ => None,
            },
            ValidityCheck::TotalQuota => {
                let limit = ctx.voucher.max_redemptions_total;
                if limit == 0 {
                    None
                } else {
                    let count = counter.global_redeemed_count(ctx.voucher.id)?;
                    (count >= u64::from(limit)).then_some(ReasonCode::LimitTotalReached)
                }
            }
            ValidityCheck::UserQuota => {
                let limit = ctx.voucher.max_redemptions_per_user;
                match ctx.caller {
                    Some(user) if limit > 0 => {
                        let count = counter.user_redeemed_count(user, ctx.voucher.id)?;
                        (count >= u64::from(limit)).then_some(ReasonCode::LimitUserReached)
                    }
                    _ => None,
                }
            }
        };
        Ok(reason)
    }
}

/// Runs every check in `EVALUATION_ORDER`; the first failure wins.
pub fn evaluate<Q: QuotaCounter>(
    ctx: &EvaluationContext<'_>,
    counter: &Q,
) -> Result<Verdict, Q::Error> {
    for check in EVALUATION_ORDER {
        if let Some(reason) = check.apply(ctx, counter)? {
            return Ok(Verdict::rejected(reason));
        }
    }
    Ok(Verdict::ok())
}

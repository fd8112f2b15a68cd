//! # Quota Counting
//!
//! Counts are point-in-time and recomputed from the Redemption log on every
//! call. There are no live counters to drift out of sync.

use shared_types::UserId;

use super::entities::VoucherId;

/// Redemption counts consulted by the validity evaluator.
///
/// Implementations are only queried when the corresponding limit is
/// configured (`> 0`).
pub trait QuotaCounter {
    type Error;

    /// Redemptions recorded for `voucher_id` across all users.
    fn global_redeemed_count(&self, voucher_id: VoucherId) -> Result<u64, Self::Error>;

    /// Redemptions recorded for `voucher_id` by `user_id`.
    fn user_redeemed_count(&self, user_id: UserId, voucher_id: VoucherId)
        -> Result<u64, Self::Error>;
}

impl<T: QuotaCounter + ?Sized> QuotaCounter for &T {
    type Error = T::Error;

    fn global_redeemed_count(&self, voucher_id: VoucherId) -> Result<u64, Self::Error> {
        (**self).global_redeemed_count(voucher_id)
    }

    fn user_redeemed_count(
        &self,
        user_id: UserId,
        voucher_id: VoucherId,
    ) -> Result<u64, Self::Error> {
        (**self).user_redeemed_count(user_id, voucher_id)
    }
}

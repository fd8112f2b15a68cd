//! # Inbound Ports (Driving Ports)
//!
//! The public API of the redemption engine, split by audience:
//!
//! - `RedemptionApi` - point-of-sale operations (validate, redeem) and the
//!   anonymous status lookup.
//! - `AdministrationApi` - campaign and batch management, audit listings.
//!
//! Every method takes the caller identity produced by the upstream
//! authentication layer; role and organization checks happen before any
//! store access.

use shared_types::CallerIdentity;

use crate::domain::entities::{LifecycleStatus, Scan, Voucher, VoucherId};
use crate::domain::errors::RedemptionError;
use crate::domain::outcomes::{
    BatchReceipt, InstancePage, OrgStats, PublicStatus, RedemptionEntry, RedemptionReceipt,
    StatusAck, ValidationOutcome,
};
use crate::domain::value_objects::{NewVoucher, ScanContext};

/// Operator-facing API.
pub trait RedemptionApi: Send + Sync {
    /// Evaluate a token without mutating redemption state.
    ///
    /// A Scan is recorded for every call, including unknown tokens.
    /// An invalid verdict is returned as data (`valid: false`).
    ///
    /// ## Errors
    ///
    /// - `Forbidden`: caller is neither admin nor operator
    /// - `InvalidRequest`: token is empty
    /// - `NotFound`: no such token in the caller's organization
    fn validate(
        &self,
        token: &str,
        caller: &CallerIdentity,
        context: &ScanContext,
    ) -> Result<ValidationOutcome, RedemptionError>;

    /// Redeem a token exactly once.
    ///
    /// ## Atomicity
    ///
    /// The instance update and its Redemption record commit in one
    /// conditional batch. On any failure no redemption state is written and
    /// a signature blob persisted for the attempt is removed.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: no such token in the caller's organization
    /// - `InvalidState`: the evaluator rejected the current state
    /// - `BlobPersistFailure`: signature could not be decoded or stored
    /// - `AlreadyRedeemed`: another caller won the race
    /// - `StorageFailure`: store error or contention retries exhausted
    fn redeem(
        &self,
        token: &str,
        caller: &CallerIdentity,
        signature_data_url: Option<&str>,
    ) -> Result<RedemptionReceipt, RedemptionError>;

    /// Anonymous status lookup. Records no Scan.
    ///
    /// ## Errors
    ///
    /// - `Restricted`: public lookups are disabled by configuration
    /// - `NotFound`: unknown token
    fn public_status(&self, token: &str) -> Result<PublicStatus, RedemptionError>;
}

/// Administrator-facing API.
pub trait AdministrationApi: Send + Sync {
    fn create_voucher(
        &self,
        caller: &CallerIdentity,
        request: NewVoucher,
    ) -> Result<Voucher, RedemptionError>;

    /// Change a voucher's operational status.
    fn set_voucher_status(
        &self,
        caller: &CallerIdentity,
        voucher_id: VoucherId,
        status: LifecycleStatus,
    ) -> Result<Voucher, RedemptionError>;

    /// Vouchers of the caller's organization, newest first.
    fn list_vouchers(&self, caller: &CallerIdentity) -> Result<Vec<Voucher>, RedemptionError>;

    /// Create `count` instances in one atomic batch.
    ///
    /// `count` must be within `1..=max_batch_size`. `expiry_days` defaults
    /// to the configured value and must be at least 1.
    fn generate_batch(
        &self,
        caller: &CallerIdentity,
        voucher_id: VoucherId,
        count: u32,
        expiry_days: Option<u32>,
    ) -> Result<BatchReceipt, RedemptionError>;

    /// Page through a voucher's instances. `limit` is capped.
    fn list_instances(
        &self,
        caller: &CallerIdentity,
        voucher_id: VoucherId,
        offset: usize,
        limit: usize,
    ) -> Result<InstancePage, RedemptionError>;

    /// Change an instance's operational status. Never touches redemption
    /// fields.
    fn set_instance_status(
        &self,
        caller: &CallerIdentity,
        token: &str,
        status: LifecycleStatus,
    ) -> Result<StatusAck, RedemptionError>;

    /// Most recent redemptions of the organization, newest first.
    ///
    /// Open to operators as well as admins.
    fn list_redemptions(
        &self,
        caller: &CallerIdentity,
        limit: usize,
    ) -> Result<Vec<RedemptionEntry>, RedemptionError>;

    /// Most recent scans of the organization, newest first.
    fn list_scans(
        &self,
        caller: &CallerIdentity,
        limit: usize,
    ) -> Result<Vec<Scan>, RedemptionError>;

    fn stats(&self, caller: &CallerIdentity) -> Result<OrgStats, RedemptionError>;
}

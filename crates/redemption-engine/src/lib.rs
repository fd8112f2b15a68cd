//! # Voucher Redemption Engine
//!
//! Issues single-use voucher tokens and redeems them exactly once, under
//! time-window and quota constraints, with an auditable trail.
//!
//! ## Data Flow
//!
//! ```text
//! operator ── validate ──→ [load instance + voucher] → [evaluate] → verdict
//!                   └────→ Scan (always, pass or fail)
//!
//! operator ── redeem ────→ [load] → [evaluate] → [persist signature?]
//!                                               ↓
//!                           conditional batch: instance + Redemption + fence
//! ```
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Exactly-once redemption | instance `Equals` precondition + `r:{voucher}:{instance}` `Absent` precondition |
//! | `redeemed_at` set at most once | `VoucherInstance::with_redemption` returns `None` when already redeemed |
//! | Quota never exceeded | per-voucher fence bumped by every redemption, checked on commit |
//! | Scan on every validate | recorded before lookup; failures logged, never surfaced |
//! | Batches all-or-nothing | one conditional batch per `generate_batch` call |
//! | Status edits never clobber redemptions | compare-and-set on the stored instance bytes |
//! | Unguessable tokens | 192 bits of OS entropy; failure is an error, never a fallback |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Entities, validity evaluation, errors, configuration
//! - `ports/` - Port traits (inbound API, outbound SPI)
//! - `adapters/` - In-memory and file-backed stores, clock, entropy, codec
//! - `service/` - Application service implementing the API
//!
//! ## Usage
//!
//! ```ignore
//! use redemption_engine::{EngineConfig, RedemptionApi, RedemptionService, ScanContext};
//!
//! let service = RedemptionService::new_in_memory(EngineConfig::default());
//! let outcome = service.validate(&token, &caller, &ScanContext::default())?;
//! if outcome.valid {
//!     service.redeem(&token, &caller, None)?;
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key types for convenience
pub use domain::entities::{
    InstanceId, LifecycleStatus, Redemption, RewardType, Scan, Timestamp, Voucher, VoucherId,
    VoucherInstance,
};
pub use domain::errors::{
    BlobStoreError, EntropyError, KVStoreError, RedemptionError, SerializationError,
};
pub use domain::outcomes::{
    BatchReceipt, InstancePage, OrgStats, PublicDetails, PublicStatus, RedemptionEntry,
    RedemptionReceipt, StatusAck, ValidationOutcome, VoucherSummary,
};
pub use domain::signature::{BlobHandle, ImageFormat, SignatureImage};
pub use domain::token::Token;
pub use domain::validity::{evaluate, EvaluationContext, ReasonCode, ValidityCheck, Verdict};
pub use domain::value_objects::{EngineConfig, KeyPrefix, NewVoucher, ScanContext};
pub use ports::inbound::{AdministrationApi, RedemptionApi};
pub use ports::outbound::{
    BatchOperation, BlobStore, EntropySource, KeyValueStore, Precondition, ScanResult,
    TimeSource, WriteOutcome,
};
pub use service::{RedemptionDependencies, RedemptionService};

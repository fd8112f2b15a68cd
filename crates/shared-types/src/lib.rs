//! # Shared Types Crate
//!
//! Types that cross crate boundaries in the voucher redemption workspace.
//!
//! ## Design Principles
//!
//! - **Identity is a capability**: `CallerIdentity` is handed to the engine by
//!   an upstream authentication layer. The engine trusts it and never inspects
//!   credentials.
//! - **Organization scope**: every caller carries exactly one `OrgId`, and all
//!   engine lookups are filtered by it.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;

//! # Domain Layer
//!
//! Pure domain logic for the redemption engine. Nothing here touches storage,
//! clocks or the OS entropy source directly.
//!
//! ## Modules
//!
//! - `entities` - Voucher, VoucherInstance, Scan, Redemption
//! - `token` - Public token encoding
//! - `validity` - Ordered validity checks and reason codes
//! - `quota` - Redemption counting contract used by the evaluator
//! - `signature` - Signature data URL decoding and blob handles
//! - `value_objects` - Configuration, key layout, request values
//! - `outcomes` - Operation results
//! - `errors` - Domain error types

pub mod entities;
pub mod errors;
pub mod outcomes;
pub mod quota;
pub mod signature;
pub mod token;
pub mod validity;
pub mod value_objects;

//! # Voucher Redemption Test Suite
//!
//! Cross-crate tests that drive the engine through real adapters.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # criterion benchmarks (validate, redeem, batches)
//! └── src/integration/
//!     ├── concurrency.rs  # exactly-once and quota races across threads
//!     └── persistence.rs  # restart over file-backed storage
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p voucher-tests
//! cargo test -p voucher-tests integration::persistence::
//! cargo bench -p voucher-tests
//! ```

pub mod integration;

//! Infrastructure Adapters
//!
//! Implementations of infrastructure traits (Time, Entropy).

mod entropy;
mod time;

pub use entropy::OsEntropySource;
pub use time::SystemTimeSource;

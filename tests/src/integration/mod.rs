//! Integration flows across the engine and node crates.

mod concurrency;
mod persistence;

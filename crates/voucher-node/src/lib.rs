//! # Voucher Node Runtime Library
//!
//! Wires the redemption engine to real storage and exposes it through a
//! command-line interface. The binary entry point is `main.rs`.
//!
//! ## Modules
//!
//! - `container/` - `NodeConfig` from the environment and service assembly
//! - `adapters/` - RocksDB backend (feature `rocksdb`) and the data directory lock
//! - `cli` / `commands` - clap command tree and JSON dispatch
//! - `telemetry` - `tracing-subscriber` setup

#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod cli;
pub mod commands;
pub mod container;
pub mod telemetry;

pub use container::{ConfigError, NodeConfig, NodeContainer, NodeError, NodeService, StorageBackend};

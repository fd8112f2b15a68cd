//! Clap derive structures for the `voucher-node` CLI.
//!
//! Every subcommand runs one engine operation against the configured store
//! and prints the result as JSON. The caller identity (`--org`, `--user`,
//! `--role`) stands in for the session layer that would normally supply it.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use redemption_engine::{LifecycleStatus, RewardType, Timestamp, VoucherId};
use shared_types::{CallerIdentity, OrgId, Role, UserId};

use crate::container::{NodeConfig, StorageBackend};

/// voucher-node: voucher issuance and exactly-once redemption
#[derive(Debug, Parser)]
#[command(
    name = "voucher-node",
    version,
    about = "Issue, validate and redeem single-use voucher tokens",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Data directory (overrides VR_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend (overrides VR_STORAGE_BACKEND)
    #[arg(long, global = true)]
    pub backend: Option<BackendArg>,

    /// Enable the unauthenticated `status` lookup
    #[arg(long, global = true)]
    pub public_status: bool,

    /// Log filter directive (overrides VR_LOG_LEVEL)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Compact single-line JSON output
    #[arg(long, global = true)]
    pub compact: bool,

    /// Organization of the caller
    #[arg(long, env = "VR_ORG", default_value_t = 1, global = true)]
    pub org: u64,

    /// User id of the caller
    #[arg(long, env = "VR_USER", default_value_t = 1, global = true)]
    pub user: u64,

    /// Role of the caller
    #[arg(long, env = "VR_ROLE", default_value = "admin", global = true)]
    pub role: RoleArg,
}

impl GlobalOpts {
    /// Apply flag overrides on top of the environment configuration.
    pub fn apply(&self, config: &mut NodeConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(backend) = self.backend {
            config.storage_backend = backend.into();
        }
        if self.public_status {
            config.public_token_status = true;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if self.json_logs {
            config.json_logs = true;
        }
    }

    pub fn caller(&self) -> CallerIdentity {
        CallerIdentity::new(UserId(self.user), OrgId(self.org), self.role.into())
    }
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Memory,
    File,
    Rocksdb,
}

impl From<BackendArg> for StorageBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => StorageBackend::Memory,
            BackendArg::File => StorageBackend::File,
            BackendArg::Rocksdb => StorageBackend::RocksDb,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Admin,
    Operator,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Role::Admin,
            RoleArg::Operator => Role::Operator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RewardArg {
    Percent,
    Fixed,
    Free,
    FreeItem,
}

impl From<RewardArg> for RewardType {
    fn from(arg: RewardArg) -> Self {
        match arg {
            RewardArg::Percent => RewardType::Percent,
            RewardArg::Fixed => RewardType::Fixed,
            RewardArg::Free => RewardType::Free,
            RewardArg::FreeItem => RewardType::FreeItem,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Active,
    Paused,
    Disabled,
}

impl From<StatusArg> for LifecycleStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Active => LifecycleStatus::Active,
            StatusArg::Paused => LifecycleStatus::Paused,
            StatusArg::Disabled => LifecycleStatus::Disabled,
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a voucher campaign
    CreateVoucher(CreateVoucherArgs),

    /// Change a voucher's status
    VoucherStatus {
        voucher_id: VoucherId,
        status: StatusArg,
    },

    /// List the organization's vouchers, newest first
    Vouchers,

    /// Issue a batch of instances for a voucher
    Generate {
        voucher_id: VoucherId,
        #[arg(long, short = 'n')]
        count: u32,
        /// Instance lifetime in days (default from configuration)
        #[arg(long)]
        expiry_days: Option<u32>,
    },

    /// Page through a voucher's instances
    Instances {
        voucher_id: VoucherId,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Change an instance's status
    InstanceStatus { token: String, status: StatusArg },

    /// Check whether a token can be redeemed (records a scan)
    Validate {
        token: String,
        #[arg(long, default_value = "")]
        ip: String,
        #[arg(long, default_value = "voucher-node-cli")]
        user_agent: String,
    },

    /// Redeem a token
    Redeem {
        token: String,
        /// Signature image as a `data:image/...;base64,` URL
        #[arg(long, conflicts_with = "signature_file")]
        signature: Option<String>,
        /// File containing the signature data URL
        #[arg(long)]
        signature_file: Option<PathBuf>,
    },

    /// Recent redemptions, newest first
    Redemptions {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Recent scans, newest first
    Scans {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Organization totals
    Stats,

    /// Public token status lookup (no caller)
    Status { token: String },
}

#[derive(Debug, Args)]
pub struct CreateVoucherArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long = "type", value_enum)]
    pub reward_type: RewardArg,

    #[arg(long, default_value_t = 0.0)]
    pub value: f64,

    #[arg(long, value_enum, default_value = "active")]
    pub status: StatusArg,

    /// Window start (unix seconds)
    #[arg(long)]
    pub starts_at: Option<Timestamp>,

    /// Window end (unix seconds)
    #[arg(long)]
    pub ends_at: Option<Timestamp>,

    /// Total redemption cap (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub max_total: u32,

    /// Per-user redemption cap (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub max_per_user: u32,
}

//! # Domain Errors
//!
//! Error types for the redemption engine.
//!
//! - Validation failures are data (`Verdict { valid: false, .. }`), never errors.
//! - Every `RedemptionError` exposes a stable `code()` for callers; raw
//!   internal messages stay in logs.

use shared_types::AccessError;
use std::fmt;
use thiserror::Error;

use super::signature::SignatureError;
use super::validity::ReasonCode;

/// Errors surfaced by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedemptionError {
    /// Token or voucher does not exist within the caller's organization.
    #[error("Not found")]
    NotFound,

    /// The evaluator rejected the freshly loaded state.
    #[error("Invalid state: {reason}")]
    InvalidState { reason: ReasonCode },

    /// Another caller redeemed the instance between load and commit.
    #[error("Instance was redeemed concurrently")]
    AlreadyRedeemed,

    /// The store failed, or optimistic retries were exhausted.
    #[error("Storage failure: {message}")]
    StorageFailure { message: String },

    /// The signature could not be decoded or persisted.
    #[error("Signature persist failure: {message}")]
    BlobPersistFailure { message: String },

    #[error(transparent)]
    Forbidden(#[from] AccessError),

    /// Malformed input (batch size, missing fields, empty token).
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// OS entropy could not be read; tokens are never generated from a
    /// weaker source.
    #[error("Entropy unavailable: {message}")]
    EntropyUnavailable { message: String },

    /// Public token status lookups are disabled.
    #[error("Public token status is restricted")]
    Restricted,
}

impl RedemptionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RedemptionError::NotFound => "not_found",
            RedemptionError::InvalidState { .. } => "invalid",
            RedemptionError::AlreadyRedeemed => "redeemed_concurrently",
            RedemptionError::StorageFailure { .. } => "storage_failure",
            RedemptionError::BlobPersistFailure { .. } => "signature_failure",
            RedemptionError::Forbidden(_) => "forbidden",
            RedemptionError::InvalidRequest { .. } => "invalid_request",
            RedemptionError::EntropyUnavailable { .. } => "entropy_unavailable",
            RedemptionError::Restricted => "restricted",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RedemptionError::StorageFailure { .. })
    }

    /// Evaluator reason, for `InvalidState`.
    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            RedemptionError::InvalidState { reason } => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        RedemptionError::InvalidRequest {
            message: message.into(),
        }
    }
}

impl From<KVStoreError> for RedemptionError {
    fn from(err: KVStoreError) -> Self {
        RedemptionError::StorageFailure {
            message: err.to_string(),
        }
    }
}

impl From<SerializationError> for RedemptionError {
    fn from(err: SerializationError) -> Self {
        RedemptionError::StorageFailure {
            message: err.to_string(),
        }
    }
}

impl From<BlobStoreError> for RedemptionError {
    fn from(err: BlobStoreError) -> Self {
        RedemptionError::BlobPersistFailure {
            message: err.to_string(),
        }
    }
}

impl From<SignatureError> for RedemptionError {
    fn from(err: SignatureError) -> Self {
        RedemptionError::BlobPersistFailure {
            message: err.to_string(),
        }
    }
}

impl From<EntropyError> for RedemptionError {
    fn from(err: EntropyError) -> Self {
        RedemptionError::EntropyUnavailable {
            message: err.to_string(),
        }
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    IOError { message: String },
    /// Data corruption in the store.
    CorruptionError { message: String },
}

impl fmt::Display for KVStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVStoreError::IOError { message } => write!(f, "KV store I/O error: {}", message),
            KVStoreError::CorruptionError { message } => {
                write!(f, "KV store corruption: {}", message)
            }
        }
    }
}

impl std::error::Error for KVStoreError {}

/// Blob store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobStoreError {
    #[error("Blob store I/O error: {message}")]
    IOError { message: String },

    #[error("Blob handle not owned by this store: {handle}")]
    ForeignHandle { handle: String },
}

/// Entropy source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntropyError {
    #[error("OS entropy source failed: {0}")]
    Unavailable(String),
}

/// Serialization errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationError {
    pub message: String,
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Serialization error: {}", self.message)
    }
}

impl std::error::Error for SerializationError {}

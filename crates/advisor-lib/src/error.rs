//! Error taxonomy for the advisor engine
//!
//! Validation and batch-level upstream errors stop a request. Upstream
//! errors inside a single workload pipeline are converted into an inline
//! `WorkloadFailure`. Cache errors never leave the cache layer.

use std::time::Duration;
use thiserror::Error;

/// Request rejected before any engine work
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}': must match [a-z0-9-]+")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("time range {0}h is out of bounds: must be between 1 and 168 hours")]
    TimeRangeOutOfBounds(u32),
}

impl ValidationError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidIdentifier { .. } => "invalid_identifier",
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::TimeRangeOutOfBounds(_) => "time_range_out_of_bounds",
        }
    }
}

/// Failure reported by, or while talking to, the telemetry backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("telemetry backend rejected credentials: {0}")]
    Unauthenticated(String),

    #[error("permission denied by telemetry backend: {0}")]
    PermissionDenied(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("telemetry backend unavailable: {0}")]
    Unavailable(String),

    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed telemetry response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Unauthenticated(_) => "unauthenticated",
            UpstreamError::PermissionDenied(_) => "permission_denied",
            UpstreamError::NotFound(_) => "not_found",
            UpstreamError::Unavailable(_) => "unavailable",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Malformed(_) => "malformed",
        }
    }
}

/// Errors that fail a whole batch
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("batch did not complete within {0:?}")]
    BatchTimeout(Duration),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(e) => e.kind(),
            EngineError::Upstream(e) => e.kind(),
            EngineError::BatchTimeout(_) => "batch_timeout",
        }
    }
}

/// Cache store failure; absorbed by the cache layer
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache entry codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

//! Unified error type for the data layer
//!
//! One enum carries the whole failure taxonomy: startup/config problems,
//! remote API outcomes (auth, not-found, throttled), cancellation, and
//! storage failures. Callers branch on `kind()` and `is_retryable()` rather
//! than matching wrapped causes.

use std::time::Duration;

use thiserror::Error;

use crate::core::constants::{EXIT_CONFIG, EXIT_RUNTIME};

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Missing token, malformed config file, bad CLI combination
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote rejected the credential (HTTP 401/403). Not retryable.
    #[error("Authentication failed ({status}): {detail}")]
    Auth { status: u16, detail: String },

    /// Channel, user, or ticket does not exist (HTTP 404)
    #[error("Not found: {entity}")]
    NotFound { entity: String },

    /// Transient remote failure (HTTP 429 / 5xx). The client surfaces this
    /// without retrying; callers decide.
    #[error("Retryable remote error ({status})")]
    Retryable {
        status: u16,
        retry_after: Option<Duration>,
    },

    /// Unexpected remote response
    #[error("Remote API error: {0}")]
    Fatal(String),

    /// Deadline or cancel signal fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Row violates a required-field invariant; indicates a bug upstream
    #[error("Schema violation: {0}")]
    Schema(String),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failure (connect, timeout, body decode)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Parquet encode/decode error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow array construction error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Analytical engine error
    #[error("DuckDB error: {0}")]
    Duckdb(#[from] duckdb::Error),
}

impl DataError {
    /// Create a not-found error naming the missing entity
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    /// Short kind tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth { .. } => "auth",
            Self::NotFound { .. } => "not_found",
            Self::Retryable { .. } => "retryable",
            Self::Fatal(_) => "fatal",
            Self::Cancelled => "cancelled",
            Self::Schema(_) => "schema",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Parquet(_) => "parquet",
            Self::Arrow(_) => "arrow",
            Self::Duckdb(_) => "duckdb",
        }
    }

    /// Whether a retry with backoff could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Retryable { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Process exit code per the CLI contract: 1 for user/config errors,
    /// 2 for runtime errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            _ => EXIT_RUNTIME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = DataError::Auth {
            status: 401,
            detail: "invalid_auth".into(),
        };
        assert_eq!(err.to_string(), "Authentication failed (401): invalid_auth");

        let err = DataError::not_found("ticket=ABC-123");
        assert_eq!(err.to_string(), "Not found: ticket=ABC-123");
    }

    #[test]
    fn test_is_retryable() {
        assert!(
            DataError::Retryable {
                status: 429,
                retry_after: Some(Duration::from_secs(5)),
            }
            .is_retryable()
        );
        assert!(!DataError::Config("missing token".into()).is_retryable());
        assert!(!DataError::Cancelled.is_retryable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DataError::Config("bad".into()).exit_code(), 1);
        assert_eq!(DataError::Cancelled.exit_code(), 2);
        assert_eq!(DataError::Schema("dup id".into()).exit_code(), 2);
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(DataError::Cancelled.kind(), "cancelled");
        assert_eq!(DataError::not_found("user=U1").kind(), "not_found");
    }
}

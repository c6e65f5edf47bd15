//! Central error type for the sync service.
//!
//! Every fallible operation in the crate eventually converges on [`SyncError`]
//! so the orchestrator can make a single retry/circuit-breaker decision
//! regardless of which layer raised it.

use thiserror::Error;

/// Severity attached to an error for aggregation and alerting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storefront connection failed: {0}")]
    StorefrontConnection(String),

    #[error("storefront API error ({status}): {message}")]
    StorefrontApi { status: u16, message: String },

    #[error("storefront rejected credentials: {0}")]
    StorefrontUnauthorized(String),

    #[error("storefront permanent API error ({status}): {message}")]
    StorefrontPermanent { status: u16, message: String },

    #[error("storefront rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("rms connection failed: {0}")]
    RmsConnection(String),

    #[error("rms query failed: {0}")]
    RmsQuery(String),

    #[error("order conversion failed for {reference}: {reason}")]
    Conversion { reference: String, reason: String },

    #[error("customer resolution failed for order {reference}: {reason}")]
    CustomerResolution { reference: String, reason: String },

    #[error("invalid order data: {0}")]
    InvalidOrderData(String),

    #[error("sync operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("circuit breaker open for {0}")]
    CircuitOpen(String),

    #[error("sync failed: {0}")]
    Sync(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Mirrors §7's retry table: connection and rate-limit failures are
    /// transient; data/validation failures and the storefront's `stopOn`
    /// kinds (`Unauthorized`, `PermanentApi`) are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::Conversion { .. }
                | SyncError::CustomerResolution { .. }
                | SyncError::InvalidOrderData(_)
                | SyncError::Configuration(_)
                | SyncError::StorefrontUnauthorized(_)
                | SyncError::StorefrontPermanent { .. }
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SyncError::RmsConnection(_) | SyncError::StorefrontConnection(_) => {
                ErrorSeverity::High
            }
            SyncError::CircuitOpen(_) | SyncError::Timeout(_) => ErrorSeverity::High,
            SyncError::RateLimited { .. } => ErrorSeverity::Low,
            SyncError::Conversion { .. } | SyncError::CustomerResolution { .. } => {
                ErrorSeverity::Medium
            }
            SyncError::InvalidOrderData(_) => ErrorSeverity::Medium,
            SyncError::Configuration(_) => ErrorSeverity::Critical,
            SyncError::StorefrontUnauthorized(_) => ErrorSeverity::Critical,
            SyncError::StorefrontPermanent { .. } => ErrorSeverity::High,
            SyncError::StorefrontApi { status, .. } if *status >= 500 => ErrorSeverity::High,
            SyncError::StorefrontApi { .. } => ErrorSeverity::Medium,
            SyncError::RmsQuery(_) => ErrorSeverity::Medium,
            SyncError::Sync(_) => ErrorSeverity::High,
        }
    }

    /// Short machine-readable category used by the error aggregator and the
    /// `/stats` admin surface.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::StorefrontConnection(_) => "STOREFRONT_CONNECTION_FAILED",
            SyncError::StorefrontApi { .. } => "STOREFRONT_API_ERROR",
            SyncError::StorefrontUnauthorized(_) => "STOREFRONT_UNAUTHORIZED",
            SyncError::StorefrontPermanent { .. } => "STOREFRONT_PERMANENT_ERROR",
            SyncError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            SyncError::RmsConnection(_) => "RMS_CONNECTION_FAILED",
            SyncError::RmsQuery(_) => "RMS_QUERY_FAILED",
            SyncError::Conversion { .. } => "SYNC_MAPPING_ERROR",
            SyncError::CustomerResolution { .. } => "SYNC_MAPPING_ERROR",
            SyncError::InvalidOrderData(_) => "INVALID_ORDER_DATA",
            SyncError::Timeout(_) => "SYNC_TIMEOUT",
            SyncError::CircuitOpen(_) => "SERVICE_UNAVAILABLE",
            SyncError::Sync(_) => "SYNC_FAILED",
            SyncError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Shared by the `reqwest` gateway and the blanket `reqwest::Error`
/// conversion below: maps an HTTP status into the §7 `stopOn`/`retryOn`
/// kinds. 429 is handled separately by callers that can read `Retry-After`.
pub(crate) fn classify_storefront_status(status: u16, message: String) -> SyncError {
    match status {
        401 | 403 => SyncError::StorefrontUnauthorized(message),
        400..=499 => SyncError::StorefrontPermanent { status, message },
        _ => SyncError::StorefrontApi { status, message },
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::RmsQuery(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(std::time::Duration::from_secs(0))
        } else if err.is_connect() {
            SyncError::StorefrontConnection(err.to_string())
        } else {
            let status = err.status().map(|s| s.as_u16()).unwrap_or(0);
            classify_storefront_status(status, err.to_string())
        }
    }
}

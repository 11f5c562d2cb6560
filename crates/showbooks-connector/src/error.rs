//! Error types for external-service calls.

use thiserror::Error;

/// Errors returned by board and ledger clients.
///
/// Errors are classified as transient (worth retrying) or permanent. The
/// batch executor retries transient failures; everything else fans out into
/// per-record failure outcomes.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Could not reach the external service.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single call exceeded its time budget.
    #[error("call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The service asked us to back off.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// The service rejected the call outright.
    #[error("operation failed: {message}")]
    OperationFailed { message: String },

    /// The service answered with something we cannot use.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// A fault on our side of the boundary.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ConnectorError {
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn timeout(timeout: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Whether the error is permanent and retrying is pointless.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Stable machine-readable code for logs and summaries.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::OperationFailed { .. } => "OPERATION_FAILED",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::Internal { .. } => "INTERNAL",
        }
    }
}

/// Result alias for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

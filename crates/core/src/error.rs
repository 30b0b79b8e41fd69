//! Unified error types for mcp-relay.
//!
//! Every variant maps to a stable JSON-RPC error code and to an
//! [`ErrorDetails`] payload that tools embed in their results.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use serde::{Deserialize, Serialize};

/// Unified error types for the mcp-relay server.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty URL list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Search pattern failed to compile.
    #[error("INVALID_PATTERN: {0}")]
    InvalidPattern(String),

    /// URL could not be parsed or uses an unsupported scheme.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The unlocker service answered with a non-success status.
    #[error("HTTP_ERROR: {message}")]
    Upstream { status: Option<u16>, message: String },

    /// The unlocker zone has exhausted its usage allowance.
    #[error("USAGE_LIMIT: {0}")]
    UsageLimit(String),

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// An operation exceeded its deadline.
    #[error("TIMEOUT: request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The sliding-window call budget is exhausted.
    #[error("RATE_LIMITED: Rate limit exceeded: {0}")]
    RateLimited(String),

    /// A task failed outside of any upstream interaction (e.g. it panicked).
    #[error("INTERNAL_ERROR: {0}")]
    Internal(String),
}

/// Structured error payload exposed to MCP clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Error {
    /// Error family name, used as `error_details.type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) | Error::InvalidPattern(_) | Error::InvalidUrl(_) => "ValidationError",
            Error::Upstream { .. } => "UpstreamError",
            Error::UsageLimit(_) => "UsageLimitError",
            Error::Network(_) => "NetworkError",
            Error::Timeout { .. } => "TimeoutError",
            Error::RateLimited(_) => "RateLimitError",
            Error::Internal(_) => "InternalError",
        }
    }

    /// Human-readable message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Error::InvalidInput(msg)
            | Error::InvalidPattern(msg)
            | Error::InvalidUrl(msg)
            | Error::UsageLimit(msg)
            | Error::Network(msg)
            | Error::Internal(msg) => msg.clone(),
            Error::Upstream { message, .. } => message.clone(),
            Error::Timeout { timeout_ms } => {
                format!("Request timed out after {} seconds", *timeout_ms as f64 / 1000.0)
            }
            Error::RateLimited(display) => format!("Rate limit exceeded: {display}"),
        }
    }

    /// HTTP status reported by the upstream service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Upstream { status, .. } => *status,
            Error::UsageLimit(_) => Some(403),
            _ => None,
        }
    }

    pub fn details(&self) -> ErrorDetails {
        ErrorDetails {
            message: self.message(),
            kind: self.kind().to_string(),
            status: self.status(),
            timeout_ms: match self {
                Error::Timeout { timeout_ms } => Some(*timeout_ms),
                _ => None,
            },
        }
    }

    fn code(&self) -> i32 {
        match self {
            Error::InvalidInput(_) | Error::InvalidPattern(_) => -32602,
            Error::InvalidUrl(_) => -32003,
            Error::Timeout { .. } => -32006,
            Error::Upstream { .. } | Error::Network(_) => -32008,
            Error::RateLimited(_) => -32010,
            Error::UsageLimit(_) => -32013,
            Error::Internal(_) => -32603,
        }
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let data = serde_json::to_value(err.details()).ok();
        McpError { code: ErrorCode(err.code()), message: err.message().into(), data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("urls cannot be empty".to_string());
        assert!(err.to_string().contains("INVALID_INPUT"));
        assert!(err.to_string().contains("urls cannot be empty"));
    }

    #[test]
    fn test_timeout_message_uses_seconds() {
        let err = Error::Timeout { timeout_ms: 50_000 };
        assert_eq!(err.message(), "Request timed out after 50 seconds");

        let err = Error::Timeout { timeout_ms: 100 };
        assert_eq!(err.message(), "Request timed out after 0.1 seconds");
    }

    #[test]
    fn test_details_carry_status_and_kind() {
        let err = Error::Upstream { status: Some(502), message: "HTTP 502: bad gateway".into() };
        let details = err.details();
        assert_eq!(details.kind, "UpstreamError");
        assert_eq!(details.status, Some(502));
        assert_eq!(details.message, "HTTP 502: bad gateway");
        assert_eq!(details.timeout_ms, None);
    }

    #[test]
    fn test_details_serialize_type_field() {
        let json = serde_json::to_value(Error::RateLimited("2/1s".into()).details()).unwrap();
        assert_eq!(json["type"], "RateLimitError");
        assert_eq!(json["message"], "Rate limit exceeded: 2/1s");
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::RateLimited("100/1h".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32010);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["type"], "RateLimitError");
    }

    #[test]
    fn test_validation_errors_share_kind() {
        assert_eq!(Error::InvalidPattern("x".into()).kind(), "ValidationError");
        assert_eq!(Error::InvalidUrl("x".into()).kind(), "ValidationError");
        assert_eq!(Error::InvalidInput("x".into()).kind(), "ValidationError");
    }
}

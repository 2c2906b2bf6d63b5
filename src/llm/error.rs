//! Typed errors for calls to the hosted agent API
//!
//! Turn failures reach the browser as an `error` render command; the variant
//! only decides how loudly the failure is logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// API key missing, expired or rejected (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Quota exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Request rejected by the API (HTTP 400/404/422)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side failure (HTTP 5xx), or an `error` / `response.failed`
    /// event in the middle of a stream
    #[error("Service error: {0}")]
    ServiceError(String),

    /// Connection, timeout or truncated stream
    #[error("Network error: {0}")]
    Network(String),

    /// Response body that did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Convert HTTP status code and error text into a typed error
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::Unauthorized(error_text),
            429 => LlmError::RateLimited(error_text),
            400 | 404 | 422 => LlmError::BadRequest(error_text),
            500..=599 => LlmError::ServiceError(error_text),
            _ => LlmError::Other(anyhow::anyhow!("HTTP {}: {}", status, error_text)),
        }
    }

    /// Convert transport errors into a typed error
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            LlmError::Network(format!("Connection failed: {}", e))
        } else if e.is_decode() {
            LlmError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else {
            LlmError::Other(e.into())
        }
    }

    /// True when the failure is on our side of the wire
    pub fn is_client_error(&self) -> bool {
        matches!(self, LlmError::Unauthorized(_) | LlmError::BadRequest(_))
    }
}

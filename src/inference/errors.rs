//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. The pipeline treats
//! every variant as an opaque transport/provider failure; structured logging is
//! the caller's responsibility.

use thiserror::Error;

/// Errors that can occur while asking a model for a completion.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// SSE stream or response body could not be decoded.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    /// The model answered, but with no text.
    #[error("model '{model}' returned an empty completion")]
    EmptyCompletion { model: String },

    /// No model is registered for the requested role.
    #[error("no model configured for role '{role}'")]
    UnknownRole { role: String },
}

impl InferenceError {
    /// Whether the transport layer should retry the same request.
    ///
    /// HTTP 429 and 5xx are transient provider conditions. HTTP 404 is kept
    /// retriable because OpenRouter-style gateways return it while a free
    /// model is being rescheduled.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            InferenceError::ConnectionFailed { .. }
                | InferenceError::Timeout { .. }
                | InferenceError::HttpError { status: 404, .. }
                | InferenceError::HttpError { status: 429, .. }
                | InferenceError::HttpError { status: 500, .. }
                | InferenceError::HttpError { status: 502..=504, .. }
        )
    }
}

//! # Payment Error Types
//!
//! Typed error handling for the STK push relay.
//! All payment operations return `Result<T, PaymentError>`.

use serde_json::Value;
use thiserror::Error;

/// Core error type for all payment operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Client supplied bad input (missing phone, bad amount, bad phone shape)
    #[error("{0}")]
    Validation(String),

    /// Operator forgot to configure something; raised before any I/O
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// OAuth credential exchange with the provider failed
    #[error("Token fetch failed: {0}")]
    TokenFetchFailed(String),

    /// Token could not be obtained while submitting a payment
    #[error("Upstream auth error: {0}")]
    UpstreamAuth(String),

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered with a non-2xx business response
    #[error("Provider rejected request with status {status}")]
    ProviderRejected { status: u16, body: Value },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Validation(_) => 400,
            PaymentError::MissingConfiguration(_) => 500,
            PaymentError::TokenFetchFailed(_) => 500,
            PaymentError::UpstreamAuth(_) => 500,
            PaymentError::Network(_) => 500,
            PaymentError::ProviderRejected { status, .. } => {
                if (100..=999).contains(status) {
                    *status
                } else {
                    502
                }
            }
            PaymentError::Serialization(_) => 500,
        }
    }

    /// Terse message that is safe to show to API callers.
    pub fn client_message(&self) -> String {
        match self {
            PaymentError::Validation(msg) => msg.clone(),
            PaymentError::MissingConfiguration(_) => "service is not configured".to_string(),
            PaymentError::TokenFetchFailed(_) | PaymentError::UpstreamAuth(_) => {
                "failed to get access token".to_string()
            }
            PaymentError::Network(_) => "network error when calling stk".to_string(),
            PaymentError::ProviderRejected { .. } => "stk push failed".to_string(),
            PaymentError::Serialization(_) => "internal error".to_string(),
        }
    }

    /// Diagnostic detail for server-side failures (`None` for client errors
    /// and provider rejections, which carry their own body).
    pub fn details(&self) -> Option<String> {
        match self {
            PaymentError::Validation(_) | PaymentError::ProviderRejected { .. } => None,
            other => Some(other.to_string()),
        }
    }

    /// Returns true if the caller caused this error
    pub fn is_client_error(&self) -> bool {
        matches!(self, PaymentError::Validation(_))
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;

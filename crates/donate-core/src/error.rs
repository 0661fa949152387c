//! # Donation Error Types
//!
//! Typed error handling for the donate-gate payment layer.
//! All payment operations return `Result<T, DonationError>`.

use crate::gateway::Provider;
use thiserror::Error;

/// Core error type for all donation payment operations
#[derive(Debug, Error)]
pub enum DonationError {
    /// Input failed validation before any I/O was attempted
    #[error("validation failed: {0}")]
    Validation(String),

    /// Configuration errors (missing/malformed secret, bad base URL)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Provider API error, raised only after a network attempt
    #[error("{provider} error: {message}")]
    Provider {
        provider: Provider,
        message: String,
        /// HTTP status of the provider response, if one was received
        status: Option<u16>,
        /// Provider-specific error code, if the response carried one
        code: Option<String>,
    },

    /// Transport-level failure: the provider was never reached
    #[error("network error reaching {provider}: {message}")]
    Network { provider: Provider, message: String },

    /// The timeout helper fired before the provider responded
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// Provider returned 2xx but the body is missing required fields.
    /// Treated identically to a provider error, never as degraded success.
    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse { provider: Provider, message: String },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DonationError {
    /// Shorthand for a provider error with status and optional code
    pub fn provider(
        provider: Provider,
        message: impl Into<String>,
        status: Option<u16>,
        code: Option<String>,
    ) -> Self {
        DonationError::Provider {
            provider,
            message: message.into(),
            status,
            code,
        }
    }

    /// Returns true if retrying the same call could plausibly succeed.
    /// Validation and configuration failures need caller correction first.
    pub fn is_retryable(&self) -> bool {
        match self {
            DonationError::Network { .. } | DonationError::Timeout { .. } => true,
            DonationError::Provider { status, .. } => {
                matches!(status, Some(s) if *s >= 500)
            }
            DonationError::Validation(_)
            | DonationError::Configuration(_)
            | DonationError::MalformedResponse { .. }
            | DonationError::Serialization(_) => false,
        }
    }

    /// HTTP status code appropriate for surfacing this error to a caller
    pub fn status_code(&self) -> u16 {
        match self {
            DonationError::Validation(_) => 400,
            DonationError::Configuration(_) => 500,
            DonationError::Provider { .. } => 502,
            DonationError::Network { .. } => 503,
            DonationError::Timeout { .. } => 504,
            DonationError::MalformedResponse { .. } => 502,
            DonationError::Serialization(_) => 500,
        }
    }

    /// True for errors the caller may echo to the donor as a form-level
    /// message. Provider/network detail must be replaced with a generic
    /// "provider unavailable" message instead (Khalti 401 bodies in
    /// particular name key material).
    pub fn is_user_presentable(&self) -> bool {
        matches!(
            self,
            DonationError::Validation(_) | DonationError::Configuration(_)
        )
    }
}

/// Result type alias for donation payment operations
pub type DonationResult<T> = Result<T, DonationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(DonationError::Network {
            provider: Provider::Khalti,
            message: "connection refused".into()
        }
        .is_retryable());
        assert!(DonationError::Timeout {
            url: "https://khalti.com/api/v2/epayment/initiate/".into(),
            timeout_ms: 30_000
        }
        .is_retryable());
        assert!(
            DonationError::provider(Provider::Stripe, "internal", Some(500), None).is_retryable()
        );
        assert!(
            !DonationError::provider(Provider::Stripe, "card declined", Some(402), None)
                .is_retryable()
        );
        assert!(!DonationError::Validation("amount too small".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(DonationError::Validation("x".into()).status_code(), 400);
        assert_eq!(DonationError::Configuration("x".into()).status_code(), 500);
        assert_eq!(
            DonationError::provider(Provider::Esewa, "x", Some(401), None).status_code(),
            502
        );
        assert_eq!(
            DonationError::Timeout {
                url: "https://example.com".into(),
                timeout_ms: 50
            }
            .status_code(),
            504
        );
    }

    #[test]
    fn test_user_presentable() {
        assert!(DonationError::Validation("bad email".into()).is_user_presentable());
        assert!(!DonationError::provider(
            Provider::Khalti,
            "Invalid token: live_secret_key_...",
            Some(401),
            None
        )
        .is_user_presentable());
    }
}

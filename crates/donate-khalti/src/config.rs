//! # Khalti Configuration
//!
//! Khalti needs a secret key and a base URL (sandbox and production are
//! different hosts). Mock mode builds a credential-free config; live
//! mode requires both values from the environment.

use donate_core::{DonationError, DonationResult, PaymentMode};
use std::env;

/// Khalti sandbox API host
pub const SANDBOX_BASE_URL: &str = "https://dev.khalti.com/api/v2";

/// Khalti ePayment configuration
#[derive(Debug, Clone)]
pub struct KhaltiConfig {
    /// Merchant secret key (`live_secret_key_...` or `test_secret_key_...`);
    /// empty in mock mode
    pub secret_key: String,

    /// API base URL, no trailing slash
    pub base_url: String,

    /// Explicit return URL override (donor lands here after paying)
    pub return_url: Option<String>,

    /// Explicit website URL override (shown in the Khalti widget)
    pub website_url: Option<String>,
}

impl KhaltiConfig {
    /// Load configuration for the given mode.
    ///
    /// Mock mode never reads secrets. Live mode requires
    /// `KHALTI_SECRET_KEY` and `KHALTI_BASE_URL`; `KHALTI_RETURN_URL`
    /// and `KHALTI_WEBSITE_URL` are optional overrides.
    pub fn from_env(mode: PaymentMode) -> DonationResult<Self> {
        dotenvy::dotenv().ok();

        if !mode.is_live() {
            return Ok(Self::mock());
        }

        let secret_key = env::var("KHALTI_SECRET_KEY")
            .map_err(|_| DonationError::Configuration("KHALTI_SECRET_KEY not set".to_string()))?;
        let base_url = env::var("KHALTI_BASE_URL")
            .map_err(|_| DonationError::Configuration("KHALTI_BASE_URL not set".to_string()))?;

        Ok(Self {
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            return_url: env::var("KHALTI_RETURN_URL").ok(),
            website_url: env::var("KHALTI_WEBSITE_URL").ok(),
        })
    }

    /// Credential-free config for the mock path
    pub fn mock() -> Self {
        Self {
            secret_key: String::new(),
            base_url: SANDBOX_BASE_URL.to_string(),
            return_url: None,
            website_url: None,
        }
    }

    /// Create config with explicit values (for tests and composition
    /// roots that do not read the environment)
    pub fn new(secret_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            return_url: None,
            website_url: None,
        }
    }

    /// Builder: custom base URL (for tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Authorization header value. Khalti uses a `Key`-prefixed bearer
    /// style rather than `Bearer`.
    pub fn auth_header(&self) -> String {
        format!("Key {}", self.secret_key)
    }

    /// Whether the configured secret looks like a sandbox key
    pub fn is_sandbox_key(&self) -> bool {
        self.secret_key.starts_with("test_")
    }

    /// Whether the configured base URL is the production host
    pub fn is_production_base(&self) -> bool {
        self.base_url.contains("khalti.com") && !self.base_url.contains("dev.khalti.com")
    }
}

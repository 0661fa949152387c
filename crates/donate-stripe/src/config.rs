//! # Stripe Configuration
//!
//! Secrets load from environment variables in live mode only; mock mode
//! builds a credential-free config so the mock path never depends on a
//! key being set.

use donate_core::{DonationError, DonationResult, PaymentMode};
use std::env;

/// Stripe API configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... or sk_live_...); empty in mock mode
    pub secret_key: String,

    /// Webhook signing secret (whsec_...), needed only by callback
    /// verification
    pub webhook_secret: Option<String>,

    /// API base URL (overridable for tests)
    pub api_base_url: String,

    /// Pinned API version
    pub api_version: String,
}

impl StripeConfig {
    /// Load configuration for the given mode.
    ///
    /// Mock mode returns a credential-free config without touching the
    /// environment for secrets. Live mode requires `STRIPE_SECRET_KEY`
    /// (validated against the `sk_test_`/`sk_live_` prefixes) and
    /// optionally reads `STRIPE_WEBHOOK_SECRET`.
    pub fn from_env(mode: PaymentMode) -> DonationResult<Self> {
        dotenvy::dotenv().ok();

        if !mode.is_live() {
            return Ok(Self::mock());
        }

        let secret_key = env::var("STRIPE_SECRET_KEY")
            .map_err(|_| DonationError::Configuration("STRIPE_SECRET_KEY not set".to_string()))?;

        if !secret_key.starts_with("sk_test_") && !secret_key.starts_with("sk_live_") {
            return Err(DonationError::Configuration(
                "STRIPE_SECRET_KEY must start with sk_test_ or sk_live_".to_string(),
            ));
        }

        let webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").ok();
        if let Some(ref secret) = webhook_secret {
            if !secret.starts_with("whsec_") {
                return Err(DonationError::Configuration(
                    "STRIPE_WEBHOOK_SECRET must start with whsec_".to_string(),
                ));
            }
        }

        Ok(Self {
            secret_key,
            webhook_secret,
            ..Self::mock()
        })
    }

    /// Credential-free config for the mock path
    pub fn mock() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: None,
            api_base_url: "https://api.stripe.com".to_string(),
            api_version: "2024-12-18.acacia".to_string(),
        }
    }

    /// Create config with an explicit key (for tests and composition
    /// roots that do not read the environment)
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            ..Self::mock()
        }
    }

    /// Check if using test keys
    pub fn is_test_key(&self) -> bool {
        self.secret_key.starts_with("sk_test_")
    }

    /// Check if using live keys
    pub fn is_live_key(&self) -> bool {
        self.secret_key.starts_with("sk_live_")
    }

    /// Authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Builder: custom API base URL (for tests)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: webhook signing secret
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }
}

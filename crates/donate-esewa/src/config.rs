//! # eSewa Configuration
//!
//! eSewa needs a merchant code and a base URL. Mock mode uses the
//! public UAT merchant so nothing has to be set; live mode requires
//! both from the environment.

use donate_core::{DonationError, DonationResult, PaymentMode};
use std::env;

/// eSewa UAT (sandbox) host
pub const UAT_BASE_URL: &str = "https://uat.esewa.com.np";

/// Public merchant code accepted by the UAT host
pub const UAT_MERCHANT_CODE: &str = "EPAYTEST";

/// eSewa redirect configuration
#[derive(Debug, Clone)]
pub struct EsewaConfig {
    /// Merchant code (`scd` query parameter)
    pub merchant_code: String,

    /// Base URL, no trailing slash
    pub base_url: String,

    /// Explicit success URL override
    pub success_url: Option<String>,

    /// Explicit failure URL override
    pub failure_url: Option<String>,
}

impl EsewaConfig {
    /// Load configuration for the given mode.
    ///
    /// Mock mode uses the UAT merchant and host without reading any
    /// environment variable. Live mode requires `ESEWA_MERCHANT_CODE`
    /// and `ESEWA_BASE_URL`; `ESEWA_SUCCESS_URL` and `ESEWA_FAILURE_URL`
    /// are optional overrides.
    pub fn from_env(mode: PaymentMode) -> DonationResult<Self> {
        dotenvy::dotenv().ok();

        if !mode.is_live() {
            return Ok(Self::mock());
        }

        let merchant_code = env::var("ESEWA_MERCHANT_CODE").map_err(|_| {
            DonationError::Configuration("ESEWA_MERCHANT_CODE not set".to_string())
        })?;
        let base_url = env::var("ESEWA_BASE_URL")
            .map_err(|_| DonationError::Configuration("ESEWA_BASE_URL not set".to_string()))?;

        Ok(Self {
            merchant_code,
            base_url: base_url.trim_end_matches('/').to_string(),
            success_url: env::var("ESEWA_SUCCESS_URL").ok(),
            failure_url: env::var("ESEWA_FAILURE_URL").ok(),
        })
    }

    /// UAT config for the mock path
    pub fn mock() -> Self {
        Self {
            merchant_code: UAT_MERCHANT_CODE.to_string(),
            base_url: UAT_BASE_URL.to_string(),
            success_url: None,
            failure_url: None,
        }
    }

    /// Create config with explicit values
    pub fn new(merchant_code: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            merchant_code: merchant_code.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            success_url: None,
            failure_url: None,
        }
    }
}

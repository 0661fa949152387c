//! # donate-core
//!
//! Core types and traits for the donate-gate payment layer.
//!
//! This crate provides:
//! - `DonationContext` and the adapter result types
//! - The validation kit (amount bounds, email/name/phone, sanitizers)
//! - The security kit (masking, denylist-aware payment event logging)
//! - `PaymentSettings`/`PaymentMode` resolution (mock vs live)
//! - `DonationGateway` trait and the provider selector
//! - `DonationError` for typed error handling
//! - The timeout-wrapped HTTP helper every live adapter call uses
//!
//! ## Example
//!
//! ```rust,ignore
//! use donate_core::{
//!     validate_context, Currency, DonationContext, GatewaySelector, PaymentMode, Provider,
//! };
//!
//! let mode = PaymentMode::from_env();
//! let donation = DonationContext::new("don_42", amount, Currency::Npr, name, email);
//!
//! // Reject bad input before any network call
//! validate_context(&donation).into_result()?;
//!
//! // Dispatch to the selected provider
//! let gateway = selector.get_or_primary(Some(Provider::Khalti)).unwrap();
//! let initiation = gateway.initiate(&donation, mode).await?;
//!
//! // Redirect the donor to initiation.redirect_url
//! ```

pub mod donation;
pub mod error;
pub mod gateway;
pub mod net;
pub mod security;
pub mod settings;
pub mod urls;
pub mod validate;

// Re-exports for convenience
pub use donation::{
    format_major, to_minor_units, Currency, DonationContext, DonationInterval, InitiationResult,
    VerificationResult,
};
pub use error::{DonationError, DonationResult};
pub use gateway::{BoxedGateway, DonationGateway, GatewaySelector, Provider};
pub use net::{send_with_timeout, DEFAULT_TIMEOUT};
pub use security::{log_payment_event, mask_sensitive, sanitize_log_fields};
pub use settings::{
    provider_env_ready, resolve_settings, supported_providers, PaymentMode, PaymentSettings,
    SettingsSource, StoredSettings, SETTINGS_KEY,
};
pub use urls::CallbackUrls;
pub use validate::{
    sanitize_string, validate_amount, validate_context, validate_email, validate_name,
    validate_phone, verify_amount_match, ValidationResult,
};

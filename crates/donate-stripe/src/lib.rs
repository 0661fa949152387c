//! # donate-stripe
//!
//! Stripe Checkout card adapter for donate-gate-rs.
//!
//! - One-time donations: a Checkout Session with inline price data.
//! - Monthly donations: product, then recurring price, then a session
//!   in subscription mode.
//! - Mock mode: a deterministic `cs_test_mock_<donation_id>` session
//!   with no network call and no secrets required.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use donate_core::{DonationGateway, PaymentMode};
//! use donate_stripe::StripeGateway;
//!
//! let mode = PaymentMode::from_env();
//! let gateway = StripeGateway::from_env(mode)?;
//!
//! let initiation = gateway.initiate(&donation, mode).await?;
//! // Redirect the donor to initiation.redirect_url, keep
//! // initiation.reference_id as the session id.
//!
//! let verification = gateway.verify_session(&session_id, mode).await;
//! if verification.success { /* mark the donation complete */ }
//! ```

pub mod checkout;
pub mod config;
pub mod webhook;

// Re-exports
pub use checkout::{StripeGateway, MOCK_SESSION_PREFIX};
pub use config::StripeConfig;
pub use webhook::{
    parse_completed_checkout, verify_signature, CompletedCheckout, SIGNATURE_TOLERANCE_SECS,
};

//! # donate-khalti
//!
//! Khalti ePayment wallet adapter for donate-gate-rs.
//!
//! One POST to `/epayment/initiate/` (authorized with the merchant's
//! `Key`-style secret) returns a `pidx` reference and a hosted payment
//! URL; `/epayment/lookup/` checks the session after the donor returns.
//! Amounts are paisa with a 1000-paisa floor. Mock mode produces a
//! deterministic `mock_pidx_<donation_id>` token and a `mock=1` return
//! URL without any network call or secret.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use donate_core::{DonationGateway, PaymentMode};
//! use donate_khalti::KhaltiGateway;
//!
//! let mode = PaymentMode::from_env();
//! let gateway = KhaltiGateway::from_env(mode)?;
//!
//! let initiation = gateway.initiate(&donation, mode).await?;
//! // Redirect the donor to initiation.redirect_url; keep
//! // initiation.reference_id (the pidx) for the lookup.
//!
//! let verification = gateway.lookup(&pidx, mode).await;
//! if verification.success { /* reconcile amount, mark complete */ }
//! ```

pub mod config;
pub mod epayment;

// Re-exports
pub use config::{KhaltiConfig, SANDBOX_BASE_URL};
pub use epayment::{KhaltiGateway, MIN_MINOR_AMOUNT, MOCK_PIDX_PREFIX};

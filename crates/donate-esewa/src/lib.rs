//! # donate-esewa
//!
//! eSewa form-redirect wallet adapter for donate-gate-rs.
//!
//! eSewa's legacy flow has no session-creation API: the adapter derives
//! a deterministic reference from the donation id, encodes the amount
//! as a two-decimal string together with a zero-valued charge breakdown
//! and the merchant code, and the composed `/epay/main` URL *is* the
//! redirect target. Mock mode yields a `mock=1` success URL instead.
//!
//! Production note: real money movement on current eSewa requires the
//! signed form POST variant; this adapter intentionally implements the
//! URL-construction flow only.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use donate_core::{DonationGateway, PaymentMode};
//! use donate_esewa::EsewaGateway;
//!
//! let mode = PaymentMode::from_env();
//! let gateway = EsewaGateway::from_env(mode)?;
//!
//! let initiation = gateway.initiate(&donation, mode).await?;
//! // Redirect the donor to initiation.redirect_url.
//!
//! // In the return callback:
//! let verification = gateway.verify_callback(&donation, &ref_id, reported_amount);
//! if verification.success { /* mark the donation complete */ }
//! ```

pub mod config;
pub mod redirect;

// Re-exports
pub use config::{EsewaConfig, UAT_BASE_URL, UAT_MERCHANT_CODE};
pub use redirect::EsewaGateway;

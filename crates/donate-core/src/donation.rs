//! # Donation Types
//!
//! The donation context handed to every adapter, the supported
//! currencies, and the adapter result types.
//!
//! Amounts are `rust_decimal::Decimal` end to end. Minor-unit conversion
//! rounds to two decimal places first and then multiplies by 100, so a
//! donor-entered `12.30` is always `1230` paisa/cents, never `1229`.

use crate::error::{DonationError, DonationResult};
use crate::gateway::Provider;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Supported donation currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Nepalese rupee — the wallet providers (Khalti, eSewa) settle in NPR
    Npr,
    /// US dollar — the card provider (Stripe) settles in USD
    Usd,
}

impl Currency {
    /// ISO 4217 code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Npr => "NPR",
            Currency::Usd => "USD",
        }
    }

    /// Minor units per major unit (paisa per rupee, cents per dollar)
    pub fn minor_per_major(&self) -> i64 {
        match self {
            Currency::Npr | Currency::Usd => 100,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-time vs monthly donation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationInterval {
    #[default]
    OneTime,
    Monthly,
}

impl DonationInterval {
    pub fn is_recurring(&self) -> bool {
        matches!(self, DonationInterval::Monthly)
    }
}

/// Immutable input to every adapter.
///
/// Owned by the caller; adapters receive it by reference and never
/// mutate it. The id is caller-assigned, opaque, and stable per
/// donation. Amount and currency must pass the validation kit before
/// the context reaches any adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationContext {
    /// Caller-assigned donation identifier (stable, unique)
    pub id: String,

    /// Major-unit amount (e.g. rupees, dollars)
    pub amount: Decimal,

    /// Donation currency
    pub currency: Currency,

    /// Donor full name
    pub donor_name: String,

    /// Donor email
    pub donor_email: String,

    /// Donor phone, optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donor_phone: Option<String>,

    /// One-time or monthly
    #[serde(default)]
    pub interval: DonationInterval,
}

impl DonationContext {
    /// Create a one-time donation context
    pub fn new(
        id: impl Into<String>,
        amount: Decimal,
        currency: Currency,
        donor_name: impl Into<String>,
        donor_email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            amount,
            currency,
            donor_name: donor_name.into(),
            donor_email: donor_email.into(),
            donor_phone: None,
            interval: DonationInterval::OneTime,
        }
    }

    /// Builder: set donor phone
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.donor_phone = Some(phone.into());
        self
    }

    /// Builder: make this a monthly donation
    pub fn monthly(mut self) -> Self {
        self.interval = DonationInterval::Monthly;
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.interval.is_recurring()
    }
}

/// Convert a major-unit amount to minor units (paisa/cents).
///
/// Rounds to two decimal places (midpoint away from zero, matching the
/// behavior of formatting to two decimals before multiplying) and then
/// multiplies by 100. Exact for every two-decimal input.
pub fn to_minor_units(amount: Decimal) -> DonationResult<i64> {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (rounded * Decimal::from(100))
        .to_i64()
        .ok_or_else(|| DonationError::Validation(format!("amount out of range: {amount}")))
}

/// Format a major-unit amount with exactly two decimal places.
/// eSewa's wire format is amount-string-based, not minor-unit-based.
pub fn format_major(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

/// Adapter output: where to send the donor, and the provider token
/// to correlate the eventual return with this initiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiationResult {
    /// Provider that produced this result
    pub provider: Provider,

    /// Absolute URL to redirect the donor to
    pub redirect_url: String,

    /// Provider-specific reference token (session id, pidx, ...),
    /// opaque to the caller, always non-empty
    pub reference_id: String,

    /// When the initiation completed
    pub created_at: DateTime<Utc>,
}

impl InitiationResult {
    pub fn new(
        provider: Provider,
        redirect_url: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            redirect_url: redirect_url.into(),
            reference_id: reference_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Outcome of checking a previously-initiated session.
///
/// Consumed by the callback endpoint to decide whether to mark the
/// donation complete. Result-shaped rather than error-shaped: a
/// not-found session is a 404-class result, not an Err.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,

    /// Raw provider session/object, when one was retrieved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl VerificationResult {
    pub fn succeeded(session: serde_json::Value) -> Self {
        Self {
            success: true,
            session: Some(session),
            error: None,
            status_code: None,
        }
    }

    pub fn failed(error: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: false,
            session: None,
            error: Some(error.into()),
            status_code: Some(status_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_unit_conversion_exact() {
        assert_eq!(to_minor_units(dec!(12.30)).unwrap(), 1230);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
        assert_eq!(to_minor_units(dec!(1000000)).unwrap(), 100_000_000);
        assert_eq!(to_minor_units(dec!(25)).unwrap(), 2500);
    }

    #[test]
    fn test_minor_unit_conversion_sweep() {
        // Every two-decimal value converts without drift.
        for minor in (0i64..100_000).step_by(97).chain([9_999, 1_230, 99_999]) {
            let amount = Decimal::new(minor, 2);
            assert_eq!(to_minor_units(amount).unwrap(), minor, "amount {amount}");
        }
    }

    #[test]
    fn test_minor_unit_rounding() {
        // Sub-paisa precision rounds midpoint-away-from-zero.
        assert_eq!(to_minor_units(dec!(12.305)).unwrap(), 1231);
        assert_eq!(to_minor_units(dec!(12.304)).unwrap(), 1230);
    }

    #[test]
    fn test_format_major() {
        assert_eq!(format_major(dec!(50)), "50.00");
        assert_eq!(format_major(dec!(12.3)), "12.30");
        assert_eq!(format_major(dec!(12.345)), "12.35");
    }

    #[test]
    fn test_context_builders() {
        let donation = DonationContext::new(
            "don_42",
            dec!(500),
            Currency::Npr,
            "Asha Gurung",
            "asha@example.org",
        )
        .with_phone("9841000000")
        .monthly();

        assert!(donation.is_recurring());
        assert_eq!(donation.donor_phone.as_deref(), Some("9841000000"));
        assert_eq!(donation.currency.as_str(), "NPR");
    }

    #[test]
    fn test_verification_result_shapes() {
        let ok = VerificationResult::succeeded(serde_json::json!({"status": "Completed"}));
        assert!(ok.success);
        assert!(ok.error.is_none());

        let missing = VerificationResult::failed("session not found", 404);
        assert!(!missing.success);
        assert_eq!(missing.status_code, Some(404));
    }
}

//! # Validation Kit
//!
//! Pure input validators applied before any provider is selected.
//! Every validator returns a [`ValidationResult`]; nothing here panics
//! or performs I/O.
//!
//! Amount bounds are provider-realistic floor/ceiling guards per
//! currency, enforced uniformly ahead of adapter dispatch. Adapters do
//! not repeat these bounds; they only add provider-specific constraints
//! (e.g. Khalti's minor-unit floor) after conversion.

use crate::donation::{to_minor_units, Currency, DonationContext};
use crate::error::{DonationError, DonationResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// NPR bounds: wallet providers reject donations under Rs 10 and the
/// platform caps single donations at Rs 1,000,000.
const NPR_MIN: Decimal = dec!(10);
const NPR_MAX: Decimal = dec!(1_000_000);

/// USD bounds: card checkout floor $1, platform cap $10,000.
const USD_MIN: Decimal = dec!(1);
const USD_MAX: Decimal = dec!(10_000);

/// Characters rejected in names and stripped by [`sanitize_string`]
const FORBIDDEN_CHARS: [char; 4] = ['<', '>', '"', '\''];

/// Formatting characters stripped from phone numbers before digit checks
const PHONE_FORMAT_CHARS: [char; 5] = [' ', '-', '(', ')', '+'];

const MAX_EMAIL_LEN: usize = 255;
const MAX_NAME_LEN: usize = 255;
const MAX_SANITIZED_LEN: usize = 1000;

/// Uniform validator return shape: never panics, always returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Bridge into the error taxonomy for `?`-style call sites
    pub fn into_result(self) -> DonationResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(DonationError::Validation(
                self.error.unwrap_or_else(|| "invalid input".to_string()),
            ))
        }
    }
}

/// Validate a donation amount against the per-currency bounds.
pub fn validate_amount(amount: Decimal, currency: Currency) -> ValidationResult {
    if amount <= Decimal::ZERO {
        return ValidationResult::fail("amount must be greater than zero");
    }
    let (min, max) = match currency {
        Currency::Npr => (NPR_MIN, NPR_MAX),
        Currency::Usd => (USD_MIN, USD_MAX),
    };
    if amount < min {
        return ValidationResult::fail(format!("amount must be at least {min} {currency}"));
    }
    if amount > max {
        return ValidationResult::fail(format!("amount must not exceed {max} {currency}"));
    }
    ValidationResult::ok()
}

/// Conservative email check: single `@`, dotted domain, length cap.
/// Deliverability is the provider's problem; this only rejects input
/// that cannot be an address.
pub fn validate_email(email: &str) -> ValidationResult {
    if email.is_empty() {
        return ValidationResult::fail("email is required");
    }
    if email.len() > MAX_EMAIL_LEN {
        return ValidationResult::fail("email is too long");
    }
    if email.chars().any(char::is_whitespace) {
        return ValidationResult::fail("email must not contain whitespace");
    }
    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return ValidationResult::fail("email must contain exactly one @"),
    };
    if local.is_empty() {
        return ValidationResult::fail("email is missing the part before @");
    }
    if domain.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return ValidationResult::fail("email domain is invalid");
    }
    ValidationResult::ok()
}

/// Donor name: 2..=255 characters, and the markup-significant characters
/// `< > " '` are rejected outright rather than stripped. This is a
/// stricter policy than [`sanitize_string`]: a name carrying them fails
/// validation (so `O'Brien` is invalid here, by documented policy).
pub fn validate_name(name: &str) -> ValidationResult {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return ValidationResult::fail("name is required");
    }
    if trimmed.chars().count() < 2 {
        return ValidationResult::fail("name must be at least 2 characters");
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return ValidationResult::fail("name is too long");
    }
    if trimmed.chars().any(|c| FORBIDDEN_CHARS.contains(&c)) {
        return ValidationResult::fail("name contains forbidden characters");
    }
    ValidationResult::ok()
}

/// Phone is optional upstream; when present, formatting characters are
/// stripped and the remainder must be 7..=15 digits.
pub fn validate_phone(phone: &str) -> ValidationResult {
    let digits: String = phone
        .chars()
        .filter(|c| !PHONE_FORMAT_CHARS.contains(c))
        .collect();
    if digits.is_empty() {
        return ValidationResult::fail("phone is empty");
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return ValidationResult::fail("phone must contain only digits");
    }
    if digits.len() < 7 || digits.len() > 15 {
        return ValidationResult::fail("phone must be 7 to 15 digits");
    }
    ValidationResult::ok()
}

/// Auto-correcting sanitizer for free-text fields: strips `< > " '`,
/// trims, and truncates to 1000 characters. Fields that must not be
/// silently altered (names) go through [`validate_name`] instead.
pub fn sanitize_string(input: &str) -> String {
    let stripped: String = input
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect();
    stripped.trim().chars().take(MAX_SANITIZED_LEN).collect()
}

/// Reconcile a provider-reported amount against the original request.
///
/// Tolerance is minor-unit-aware for the wallet currency: for NPR both
/// sides are compared in paisa and `tolerance` is a paisa count; for
/// USD the comparison stays in major units.
pub fn verify_amount_match(
    expected: Decimal,
    actual: Decimal,
    currency: Currency,
    tolerance: Decimal,
) -> ValidationResult {
    let within = match currency {
        Currency::Npr => {
            let (expected_minor, actual_minor) =
                match (to_minor_units(expected), to_minor_units(actual)) {
                    (Ok(e), Ok(a)) => (e, a),
                    _ => return ValidationResult::fail("amount out of representable range"),
                };
            Decimal::from((expected_minor - actual_minor).abs()) <= tolerance
        }
        Currency::Usd => (expected - actual).abs() <= tolerance,
    };
    if within {
        ValidationResult::ok()
    } else {
        ValidationResult::fail(format!(
            "amount mismatch: expected {expected} {currency}, provider reported {actual}"
        ))
    }
}

/// Composite check callers run before handing a context to any adapter.
pub fn validate_context(donation: &DonationContext) -> ValidationResult {
    let amount = validate_amount(donation.amount, donation.currency);
    if !amount.is_valid() {
        return amount;
    }
    let name = validate_name(&donation.donor_name);
    if !name.is_valid() {
        return name;
    }
    let email = validate_email(&donation.donor_email);
    if !email.is_valid() {
        return email;
    }
    if let Some(phone) = &donation.donor_phone {
        let phone = validate_phone(phone);
        if !phone.is_valid() {
            return phone;
        }
    }
    ValidationResult::ok()
}

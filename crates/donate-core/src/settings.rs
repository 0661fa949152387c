//! # Payment Settings Resolver
//!
//! Two independent axes, both resolved fresh per call (never cached):
//!
//! - **Mode axis**: `PaymentMode` from one environment signal. Anything
//!   other than the literal `"live"` is mock, so an unset or
//!   misconfigured environment can never move money.
//! - **Capability axis**: whether a provider's secrets/URLs are present.
//!   Mock mode never depends on secrets and always reports ready.
//!
//! Persisted settings come from an external key-value settings store
//! (behind [`SettingsSource`]) and are merged with hard defaults by the
//! pure [`PaymentSettings::merge`]; the merged record guarantees the
//! primary provider is a member of the enabled set by construction.

use crate::donation::Currency;
use crate::gateway::Provider;
use serde::{Deserialize, Serialize};

/// Key under which the settings store keeps the payment record
pub const SETTINGS_KEY: &str = "payment_settings";

/// Process-wide execution mode, environment-derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    /// No network capability, no real secrets; structural responses only
    Mock,
    /// Real provider calls with real credentials
    Live,
}

impl PaymentMode {
    /// Resolve the mode from the raw environment signal. Only the
    /// literal `"live"` selects live; unset or anything else is mock.
    pub fn resolve(signal: Option<&str>) -> Self {
        match signal {
            Some("live") => PaymentMode::Live,
            _ => PaymentMode::Mock,
        }
    }

    /// Read `PAYMENT_MODE` from the environment
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::resolve(std::env::var("PAYMENT_MODE").ok().as_deref())
    }

    pub fn is_live(&self) -> bool {
        matches!(self, PaymentMode::Live)
    }
}

/// The persisted settings record as the settings store holds it.
/// Every field is optional; defaulting happens in [`PaymentSettings::merge`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default)]
    pub enabled_providers: Option<Vec<Provider>>,
    #[serde(default)]
    pub primary_provider: Option<Provider>,
    #[serde(default)]
    pub default_currency: Option<Currency>,
    #[serde(default)]
    pub recurring_allowed: Option<bool>,
}

/// The settings store is an external collaborator; the resolver only
/// needs one read per call.
pub trait SettingsSource {
    /// Load the stored record for `key`, or None when nothing persisted
    fn load(&self, key: &str) -> Option<StoredSettings>;
}

/// Resolved, read-only settings snapshot for one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Enabled providers, never empty
    pub enabled: Vec<Provider>,
    /// Primary provider, always a member of `enabled`
    pub primary: Provider,
    pub default_currency: Currency,
    pub recurring_allowed: bool,
}

impl PaymentSettings {
    /// Hard defaults used when nothing is persisted
    pub fn defaults() -> Self {
        Self {
            enabled: Provider::ALL.to_vec(),
            primary: Provider::Stripe,
            default_currency: Currency::Npr,
            recurring_allowed: false,
        }
    }

    /// Pure field-by-field merge of the persisted record over the
    /// defaults. An empty persisted enabled set falls back to the
    /// default set; a primary missing from the enabled set is inserted.
    pub fn merge(stored: Option<StoredSettings>) -> Self {
        let defaults = Self::defaults();
        let stored = stored.unwrap_or_default();

        let mut enabled = match stored.enabled_providers {
            Some(list) if !list.is_empty() => list,
            _ => defaults.enabled,
        };
        let primary = stored.primary_provider.unwrap_or(defaults.primary);
        if !enabled.contains(&primary) {
            enabled.push(primary);
        }

        Self {
            enabled,
            primary,
            default_currency: stored.default_currency.unwrap_or(defaults.default_currency),
            recurring_allowed: stored
                .recurring_allowed
                .unwrap_or(defaults.recurring_allowed),
        }
    }
}

/// Resolve settings with one read against the store. Repeated calls may
/// observe different records; callers needing a consistent view resolve
/// once and thread the snapshot through.
pub fn resolve_settings(source: &dyn SettingsSource) -> PaymentSettings {
    PaymentSettings::merge(source.load(SETTINGS_KEY))
}

fn env_nonempty(name: &str) -> bool {
    std::env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Capability axis: whether a provider's environment is usable in the
/// given mode. Mock is always ready; live requires the provider's
/// secrets and URLs.
pub fn provider_env_ready(provider: Provider, mode: PaymentMode) -> bool {
    match mode {
        PaymentMode::Mock => true,
        PaymentMode::Live => match provider {
            Provider::Stripe => env_nonempty("STRIPE_SECRET_KEY"),
            Provider::Khalti => {
                env_nonempty("KHALTI_SECRET_KEY") && env_nonempty("KHALTI_BASE_URL")
            }
            Provider::Esewa => {
                env_nonempty("ESEWA_MERCHANT_CODE") && env_nonempty("ESEWA_BASE_URL")
            }
        },
    }
}

/// Providers actually offered to donors.
///
/// Live mode intersects the enabled set with the capability axis: a
/// provider without valid secrets is silently excluded even when
/// enabled in settings. Mock mode returns the enabled set unfiltered so
/// provider selection is testable without credentials.
pub fn supported_providers(settings: &PaymentSettings, mode: PaymentMode) -> Vec<Provider> {
    settings
        .enabled
        .iter()
        .copied()
        .filter(|p| provider_env_ready(*p, mode))
        .collect()
}

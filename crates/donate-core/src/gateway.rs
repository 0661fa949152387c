//! # Donation Gateway Trait
//!
//! The uniform initiation contract every payment provider implements,
//! plus the `Provider`-keyed selector used by the composition root.
//!
//! Verification calls stay on the concrete adapters (Stripe session
//! retrieval, Khalti pidx lookup, eSewa callback check) because their
//! shapes differ too much to sit behind one signature.

use crate::donation::{DonationContext, InitiationResult};
use crate::error::DonationResult;
use crate::settings::PaymentMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The closed set of payment providers.
///
/// Adding a provider means extending this enum and fixing every match
/// the compiler flags; there is no string-based dispatch anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Stripe Checkout (card payments, USD)
    Stripe,
    /// Khalti ePayment (wallet redirect, NPR)
    Khalti,
    /// eSewa form redirect (wallet redirect, NPR)
    Esewa,
}

impl Provider {
    /// All providers, in default-enablement order
    pub const ALL: [Provider; 3] = [Provider::Stripe, Provider::Khalti, Provider::Esewa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Khalti => "khalti",
            Provider::Esewa => "esewa",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform initiation contract.
///
/// Implementations must branch on `mode` before touching any network
/// resource: the mock branch makes no calls and needs no secrets.
#[async_trait]
pub trait DonationGateway: Send + Sync {
    /// Turn a validated donation context into a redirect target.
    ///
    /// The context has already passed the generic validation kit;
    /// adapters only add provider-specific constraints on top.
    async fn initiate(
        &self,
        donation: &DonationContext,
        mode: PaymentMode,
    ) -> DonationResult<InitiationResult>;

    /// Which provider this adapter speaks for
    fn provider(&self) -> Provider;

    /// Whether the provider can take monthly donations
    fn supports_recurring(&self) -> bool {
        false
    }
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedGateway = Arc<dyn DonationGateway>;

/// Registry of gateways keyed by provider, with a primary fallback
#[derive(Clone, Default)]
pub struct GatewaySelector {
    gateways: HashMap<Provider, BoxedGateway>,
    primary: Option<Provider>,
}

impl GatewaySelector {
    /// Create an empty selector with the given primary provider
    pub fn new(primary: Provider) -> Self {
        Self {
            gateways: HashMap::new(),
            primary: Some(primary),
        }
    }

    /// Register a gateway under its own provider key
    pub fn register(&mut self, gateway: BoxedGateway) {
        self.gateways.insert(gateway.provider(), gateway);
    }

    /// Register with builder pattern
    pub fn with_gateway(mut self, gateway: BoxedGateway) -> Self {
        self.register(gateway);
        self
    }

    /// Get a gateway by provider
    pub fn get(&self, provider: Provider) -> Option<&BoxedGateway> {
        self.gateways.get(&provider)
    }

    /// Get the primary gateway
    pub fn primary_gateway(&self) -> Option<&BoxedGateway> {
        self.primary.and_then(|p| self.get(p))
    }

    /// Get a gateway or fall back to the primary
    pub fn get_or_primary(&self, provider: Option<Provider>) -> Option<&BoxedGateway> {
        match provider {
            Some(p) => self.get(p).or_else(|| self.primary_gateway()),
            None => self.primary_gateway(),
        }
    }

    /// Providers with a registered gateway
    pub fn providers(&self) -> Vec<Provider> {
        self.gateways.keys().copied().collect()
    }

    pub fn has_provider(&self, provider: Provider) -> bool {
        self.gateways.contains_key(&provider)
    }
}

//! # eSewa Form Redirect
//!
//! eSewa has no initiate API: initiation and redirect-URL construction
//! are the same step. The adapter derives a deterministic reference id
//! from the donation id, composes the `/epay/main` query string, and
//! hands the resulting URL back as the redirect target. Zero network
//! calls in both modes.
//!
//! Unlike the other two adapters, the wire amount is a two-decimal
//! string, not a minor-unit integer.

use crate::config::EsewaConfig;
use async_trait::async_trait;
use donate_core::{
    format_major, log_payment_event, verify_amount_match, CallbackUrls, DonationContext,
    DonationError, DonationGateway, DonationResult, InitiationResult, PaymentMode, Provider,
    VerificationResult,
};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::Level;
use url::Url;

/// eSewa form-redirect gateway
pub struct EsewaGateway {
    config: EsewaConfig,
    urls: CallbackUrls,
}

impl EsewaGateway {
    pub fn new(config: EsewaConfig, urls: CallbackUrls) -> Self {
        Self { config, urls }
    }

    /// Convenience constructor: config and callback URLs from the
    /// environment.
    pub fn from_env(mode: PaymentMode) -> DonationResult<Self> {
        Ok(Self::new(
            EsewaConfig::from_env(mode)?,
            CallbackUrls::from_env(),
        ))
    }

    /// Deterministic reference id: same donation id, same reference,
    /// across processes. No provider round trip needed to obtain one.
    pub fn reference_for(donation_id: &str) -> String {
        let digest = Sha256::digest(format!("esewa:{donation_id}").as_bytes());
        format!("esw-{}", &hex::encode(digest)[..16])
    }

    fn success_url(&self) -> String {
        self.config
            .success_url
            .clone()
            .unwrap_or_else(|| self.urls.success_url())
    }

    fn failure_url(&self) -> String {
        self.config
            .failure_url
            .clone()
            .unwrap_or_else(|| self.urls.failure_url())
    }

    fn mock_initiate(&self, donation: &DonationContext, reference: &str) -> InitiationResult {
        let success = self.success_url();
        let separator = if success.contains('?') { '&' } else { '?' };
        let redirect_url = format!("{success}{separator}refId={reference}&mock=1");

        log_payment_event(
            "esewa_redirect_mocked",
            &[
                ("donation_id", donation.id.clone()),
                ("reference", reference.to_string()),
            ],
            Level::INFO,
        );
        InitiationResult::new(Provider::Esewa, redirect_url, reference)
    }

    fn live_initiate(
        &self,
        donation: &DonationContext,
        reference: &str,
    ) -> DonationResult<InitiationResult> {
        let amount = format_major(donation.amount);

        let mut redirect = Url::parse(&format!("{}/epay/main", self.config.base_url))
            .map_err(|e| {
                DonationError::Configuration(format!(
                    "invalid eSewa base URL {}: {e}",
                    self.config.base_url
                ))
            })?;
        redirect
            .query_pairs_mut()
            .append_pair("amt", &amount)
            // No tax or service/delivery charges on donations; eSewa
            // still requires the full breakdown.
            .append_pair("txAmt", "0")
            .append_pair("psc", "0")
            .append_pair("pdc", "0")
            .append_pair("tAmt", &amount)
            .append_pair("pid", reference)
            .append_pair("scd", &self.config.merchant_code)
            .append_pair("su", &self.success_url())
            .append_pair("fu", &self.failure_url());

        log_payment_event(
            "esewa_redirect_built",
            &[
                ("donation_id", donation.id.clone()),
                ("reference", reference.to_string()),
                ("amount", amount),
            ],
            Level::INFO,
        );

        Ok(InitiationResult::new(
            Provider::Esewa,
            redirect.to_string(),
            reference,
        ))
    }

    /// What the return callback must verify before marking a donation
    /// complete: the reference belongs to this donation and the
    /// reported amount matches to within one paisa.
    pub fn verify_callback(
        &self,
        donation: &DonationContext,
        reference: &str,
        reported_amount: Decimal,
    ) -> VerificationResult {
        if reference != Self::reference_for(&donation.id) {
            return VerificationResult::failed(
                format!("reference {reference} does not belong to donation {}", donation.id),
                400,
            );
        }

        let amount_check =
            verify_amount_match(donation.amount, reported_amount, donation.currency, Decimal::ONE);
        if !amount_check.is_valid() {
            return VerificationResult::failed(
                amount_check
                    .error
                    .unwrap_or_else(|| "amount mismatch".to_string()),
                400,
            );
        }

        VerificationResult::succeeded(serde_json::json!({
            "refId": reference,
            "donation_id": donation.id,
            "amount": format_major(reported_amount),
            "status": "COMPLETE",
        }))
    }
}

#[async_trait]
impl DonationGateway for EsewaGateway {
    async fn initiate(
        &self,
        donation: &DonationContext,
        mode: PaymentMode,
    ) -> DonationResult<InitiationResult> {
        let reference = Self::reference_for(&donation.id);
        match mode {
            PaymentMode::Mock => Ok(self.mock_initiate(donation, &reference)),
            PaymentMode::Live => self.live_initiate(donation, &reference),
        }
    }

    fn provider(&self) -> Provider {
        Provider::Esewa
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use donate_core::Currency;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn donation() -> DonationContext {
        DonationContext::new(
            "don_np_9",
            dec!(50),
            Currency::Npr,
            "Asha Gurung",
            "asha@example.org",
        )
    }

    fn gateway() -> EsewaGateway {
        EsewaGateway::new(EsewaConfig::mock(), CallbackUrls::new("https://sahayog.org.np"))
    }

    #[test]
    fn test_reference_is_deterministic() {
        let first = EsewaGateway::reference_for("don_np_9");
        let second = EsewaGateway::reference_for("don_np_9");
        let other = EsewaGateway::reference_for("don_np_10");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first.starts_with("esw-"));
        assert_eq!(first.len(), 4 + 16);
    }

    #[tokio::test]
    async fn test_mock_redirect_carries_marker_and_reference() {
        let result = gateway()
            .initiate(&donation(), PaymentMode::Mock)
            .await
            .unwrap();
        let reference = EsewaGateway::reference_for("don_np_9");

        assert_eq!(result.reference_id, reference);
        assert!(result.redirect_url.contains("mock=1"));
        assert!(result.redirect_url.contains(&format!("refId={reference}")));
    }

    #[tokio::test]
    async fn test_live_redirect_query() {
        let result = gateway()
            .initiate(&donation(), PaymentMode::Live)
            .await
            .unwrap();

        let parsed = Url::parse(&result.redirect_url).unwrap();
        assert_eq!(parsed.path(), "/epay/main");
        let query: HashMap<String, String> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(query["amt"], "50.00");
        assert_eq!(query["tAmt"], "50.00");
        assert_eq!(query["txAmt"], "0");
        assert_eq!(query["psc"], "0");
        assert_eq!(query["pdc"], "0");
        assert_eq!(query["pid"], result.reference_id);
        assert_eq!(query["scd"], "EPAYTEST");
        assert_eq!(query["su"], "https://sahayog.org.np/donate/success");
        assert_eq!(query["fu"], "https://sahayog.org.np/donate/failure");
    }

    #[test]
    fn test_verify_callback_checks_reference_and_amount() {
        let gateway = gateway();
        let donation = donation();
        let reference = EsewaGateway::reference_for(&donation.id);

        let ok = gateway.verify_callback(&donation, &reference, dec!(50.00));
        assert!(ok.success);

        let wrong_ref = gateway.verify_callback(&donation, "esw-ffffffffffffffff", dec!(50.00));
        assert!(!wrong_ref.success);
        assert_eq!(wrong_ref.status_code, Some(400));

        let wrong_amount = gateway.verify_callback(&donation, &reference, dec!(49.00));
        assert!(!wrong_amount.success);
        assert!(wrong_amount.error.unwrap().contains("mismatch"));
    }
}

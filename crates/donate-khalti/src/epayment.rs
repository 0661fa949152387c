//! # Khalti ePayment
//!
//! Wallet adapter with a true initiate-and-redirect API: one POST to
//! `/epayment/initiate/` returns a `pidx` and a hosted payment URL, and
//! `/epayment/lookup/` checks the session afterwards.
//!
//! This adapter re-validates amount, email, and name even though the
//! caller already ran the validation kit: it is reachable on its own
//! and must not trust caller discipline alone. Validation failures
//! surface as Khalti-typed provider errors, not generic ones.

use crate::config::KhaltiConfig;
use async_trait::async_trait;
use donate_core::{
    log_payment_event, send_with_timeout, to_minor_units, validate_amount, validate_email,
    validate_name, CallbackUrls, DonationContext, DonationError, DonationGateway, DonationResult,
    InitiationResult, PaymentMode, Provider, VerificationResult, DEFAULT_TIMEOUT,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{instrument, Level};

/// Khalti rejects initiations under 1000 paisa (Rs 10). Complementary
/// to the generic NPR floor: that one runs on the major-unit amount
/// before any adapter is picked, this one runs after conversion.
pub const MIN_MINOR_AMOUNT: i64 = 1000;

/// Shape of every mock-generated reference token
pub const MOCK_PIDX_PREFIX: &str = "mock_pidx_";

/// A secret shorter than this is clearly malformed; reject it before
/// wasting a network round trip.
const MIN_SECRET_LEN: usize = 16;

/// Khalti ePayment gateway
pub struct KhaltiGateway {
    config: KhaltiConfig,
    client: Client,
    urls: CallbackUrls,
}

impl KhaltiGateway {
    pub fn new(config: KhaltiConfig, client: Client, urls: CallbackUrls) -> Self {
        Self {
            config,
            client,
            urls,
        }
    }

    /// Convenience constructor: config and callback URLs from the
    /// environment, a fresh client.
    pub fn from_env(mode: PaymentMode) -> DonationResult<Self> {
        Ok(Self::new(
            KhaltiConfig::from_env(mode)?,
            Client::new(),
            CallbackUrls::from_env(),
        ))
    }

    fn return_url(&self) -> String {
        self.config
            .return_url
            .clone()
            .unwrap_or_else(|| self.urls.success_url())
    }

    fn website_url(&self) -> String {
        self.config
            .website_url
            .clone()
            .unwrap_or_else(|| self.urls.base_url.clone())
    }

    /// Defense in depth: this adapter is independently reachable, so it
    /// re-checks the fields it forwards. Failures are Khalti-typed.
    fn revalidate(&self, donation: &DonationContext) -> DonationResult<()> {
        for check in [
            validate_amount(donation.amount, donation.currency),
            validate_email(&donation.donor_email),
            validate_name(&donation.donor_name),
        ] {
            if !check.is_valid() {
                return Err(DonationError::provider(
                    Provider::Khalti,
                    check.error.unwrap_or_else(|| "invalid input".to_string()),
                    None,
                    Some("validation".to_string()),
                ));
            }
        }
        Ok(())
    }

    fn mock_initiate(&self, donation: &DonationContext) -> InitiationResult {
        let reference = format!("{MOCK_PIDX_PREFIX}{}", donation.id);
        let return_url = self.return_url();
        let separator = if return_url.contains('?') { '&' } else { '?' };
        let redirect_url = format!("{return_url}{separator}pidx={reference}&mock=1");

        log_payment_event(
            "khalti_initiate_mocked",
            &[
                ("donation_id", donation.id.clone()),
                ("pidx", reference.clone()),
            ],
            Level::INFO,
        );
        InitiationResult::new(Provider::Khalti, redirect_url, reference)
    }

    #[instrument(skip(self, donation), fields(donation_id = %donation.id))]
    async fn live_initiate(
        &self,
        donation: &DonationContext,
        minor_amount: i64,
    ) -> DonationResult<InitiationResult> {
        let secret = self.config.secret_key.trim();
        if secret.is_empty() || secret.len() < MIN_SECRET_LEN {
            return Err(DonationError::Configuration(
                "Khalti secret key is missing or too short".to_string(),
            ));
        }

        let payload = InitiatePayload {
            return_url: self.return_url(),
            website_url: self.website_url(),
            amount: minor_amount,
            purchase_order_id: &donation.id,
            purchase_order_name: format!("Donation {}", donation.id),
            customer_info: CustomerInfo {
                name: &donation.donor_name,
                email: &donation.donor_email,
                phone: donation.donor_phone.as_deref(),
            },
            amount_breakdown: vec![AmountBreakdown {
                label: "Donation".to_string(),
                amount: minor_amount,
            }],
            product_details: vec![ProductDetail {
                identity: &donation.id,
                name: "Donation".to_string(),
                total_price: minor_amount,
                quantity: 1,
                unit_price: minor_amount,
            }],
            merchant_extra: serde_json::json!({
                "donation_id": donation.id,
                "currency": donation.currency.as_str(),
            })
            .to_string(),
        };

        let url = format!("{}/epayment/initiate/", self.config.base_url);
        let request = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .json(&payload);

        let response = send_with_timeout(Provider::Khalti, request, &url, DEFAULT_TIMEOUT).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let (message, code) = extract_error(&body);
            if self.config.is_sandbox_key() && self.config.is_production_base() {
                // Common misconfiguration: sandbox secret against the
                // production host. Usability aid only.
                log_payment_event(
                    "khalti_environment_mismatch",
                    &[
                        ("base_url", self.config.base_url.clone()),
                        ("secret_key", self.config.secret_key.clone()),
                    ],
                    Level::WARN,
                );
            }
            log_payment_event(
                "khalti_initiate_failed",
                &[
                    ("donation_id", donation.id.clone()),
                    ("status", status.as_u16().to_string()),
                    ("message", message.clone()),
                    ("secret_key", self.config.secret_key.clone()),
                ],
                Level::ERROR,
            );
            return Err(DonationError::provider(
                Provider::Khalti,
                message,
                Some(status.as_u16()),
                code,
            ));
        }

        let parsed: InitiateResponse = serde_json::from_str(&body).map_err(|e| {
            DonationError::Serialization(format!("failed to parse Khalti response: {e}"))
        })?;

        // A 2xx missing either field is a failure, not a partial success.
        let (pidx, payment_url) = match (parsed.pidx, parsed.payment_url) {
            (Some(pidx), Some(payment_url)) => (pidx, payment_url),
            (pidx, _) => {
                return Err(DonationError::MalformedResponse {
                    provider: Provider::Khalti,
                    message: format!(
                        "initiate response missing {}",
                        if pidx.is_none() { "pidx" } else { "payment_url" }
                    ),
                })
            }
        };

        log_payment_event(
            "khalti_initiate_succeeded",
            &[
                ("donation_id", donation.id.clone()),
                ("pidx", pidx.clone()),
                ("amount_paisa", minor_amount.to_string()),
                ("secret_key", self.config.secret_key.clone()),
            ],
            Level::INFO,
        );

        Ok(InitiationResult::new(Provider::Khalti, payment_url, pidx))
    }

    /// Check a previously-initiated session by its pidx.
    pub async fn lookup(&self, pidx: &str, mode: PaymentMode) -> VerificationResult {
        match mode {
            PaymentMode::Mock => match pidx.strip_prefix(MOCK_PIDX_PREFIX) {
                Some(donation_id) if !donation_id.is_empty() => {
                    VerificationResult::succeeded(serde_json::json!({
                        "pidx": pidx,
                        "status": "Completed",
                        "transaction_id": format!("mock_txn_{donation_id}"),
                    }))
                }
                _ => VerificationResult::failed(format!("unknown pidx: {pidx}"), 404),
            },
            PaymentMode::Live => self.live_lookup(pidx).await,
        }
    }

    async fn live_lookup(&self, pidx: &str) -> VerificationResult {
        if self.config.secret_key.trim().is_empty() {
            return VerificationResult::failed("Khalti secret key is not configured", 500);
        }

        let url = format!("{}/epayment/lookup/", self.config.base_url);
        let request = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .json(&serde_json::json!({ "pidx": pidx }));

        let response = match send_with_timeout(Provider::Khalti, request, &url, DEFAULT_TIMEOUT).await
        {
            Ok(response) => response,
            Err(e) => return VerificationResult::failed(e.to_string(), 500),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let (message, _) = extract_error(&body);
            return VerificationResult::failed(message, status.as_u16());
        }

        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(session) => {
                let completed = session.get("status").and_then(|s| s.as_str()) == Some("Completed");
                if completed {
                    VerificationResult::succeeded(session)
                } else {
                    let state = session
                        .get("status")
                        .and_then(|s| s.as_str())
                        .unwrap_or("unknown")
                        .to_string();
                    VerificationResult {
                        success: false,
                        session: Some(session),
                        error: Some(format!("payment not completed: {state}")),
                        status_code: None,
                    }
                }
            }
            Err(e) => VerificationResult::failed(format!("unparseable lookup body: {e}"), 500),
        }
    }
}

#[async_trait]
impl DonationGateway for KhaltiGateway {
    async fn initiate(
        &self,
        donation: &DonationContext,
        mode: PaymentMode,
    ) -> DonationResult<InitiationResult> {
        self.revalidate(donation)?;

        let minor_amount = to_minor_units(donation.amount)?;
        if minor_amount < MIN_MINOR_AMOUNT {
            return Err(DonationError::provider(
                Provider::Khalti,
                format!("amount must be at least {MIN_MINOR_AMOUNT} paisa"),
                None,
                Some("amount_below_floor".to_string()),
            ));
        }

        match mode {
            PaymentMode::Mock => Ok(self.mock_initiate(donation)),
            PaymentMode::Live => self.live_initiate(donation, minor_amount).await,
        }
    }

    fn provider(&self) -> Provider {
        Provider::Khalti
    }
}

/// Pull the most specific error message available out of a Khalti error
/// body: `detail`, then `error_key`, then the raw body.
fn extract_error(body: &str) -> (String, Option<String>) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => {
            let code = value
                .get("error_key")
                .and_then(|v| v.as_str())
                .map(String::from);
            let message = value
                .get("detail")
                .and_then(|v| v.as_str())
                .map(String::from)
                .or_else(|| code.clone())
                .unwrap_or_else(|| body.trim().to_string());
            (message, code)
        }
        Err(_) => (body.trim().to_string(), None),
    }
}

// =============================================================================
// Khalti API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct InitiatePayload<'a> {
    return_url: String,
    website_url: String,
    /// Paisa, never rupees
    amount: i64,
    purchase_order_id: &'a str,
    purchase_order_name: String,
    customer_info: CustomerInfo<'a>,
    amount_breakdown: Vec<AmountBreakdown>,
    product_details: Vec<ProductDetail<'a>>,
    /// Opaque correlation blob echoed back on lookup
    merchant_extra: String,
}

#[derive(Debug, Serialize)]
struct CustomerInfo<'a> {
    name: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct AmountBreakdown {
    label: String,
    amount: i64,
}

#[derive(Debug, Serialize)]
struct ProductDetail<'a> {
    identity: &'a str,
    name: String,
    total_price: i64,
    quantity: u32,
    unit_price: i64,
}

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    #[serde(default)]
    pidx: Option<String>,
    #[serde(default)]
    payment_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use donate_core::Currency;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_SECRET: &str = "live_secret_key_0123456789abcdef";

    fn donation() -> DonationContext {
        DonationContext::new(
            "don_np_1",
            dec!(500),
            Currency::Npr,
            "Asha Gurung",
            "asha@example.org",
        )
        .with_phone("9841000000")
    }

    fn mock_gateway() -> KhaltiGateway {
        KhaltiGateway::new(
            KhaltiConfig::mock(),
            Client::new(),
            CallbackUrls::default(),
        )
    }

    fn live_gateway(base_url: &str) -> KhaltiGateway {
        KhaltiGateway::new(
            KhaltiConfig::new(TEST_SECRET, base_url),
            Client::new(),
            CallbackUrls::new("https://sahayog.org.np"),
        )
    }

    #[tokio::test]
    async fn test_mock_initiate_is_deterministic_and_offline() {
        let gateway = mock_gateway();
        let first = gateway
            .initiate(&donation(), PaymentMode::Mock)
            .await
            .unwrap();
        let second = gateway
            .initiate(&donation(), PaymentMode::Mock)
            .await
            .unwrap();

        assert_eq!(first.reference_id, "mock_pidx_don_np_1");
        assert_eq!(first.reference_id, second.reference_id);
        assert!(first.redirect_url.contains("mock=1"));
        assert!(first.redirect_url.contains("pidx=mock_pidx_don_np_1"));
    }

    #[tokio::test]
    async fn test_revalidation_surfaces_khalti_typed_error() {
        let gateway = mock_gateway();
        let mut bad = donation();
        bad.donor_email = "not-an-email".to_string();

        let err = gateway.initiate(&bad, PaymentMode::Mock).await.unwrap_err();
        match err {
            DonationError::Provider {
                provider, code, ..
            } => {
                assert_eq!(provider, Provider::Khalti);
                assert_eq!(code.as_deref(), Some("validation"));
            }
            other => panic!("expected khalti-typed error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_live_without_secret_fails_before_network() {
        // A gateway whose config was never given a secret: the failure
        // must be a configuration error, not a network one.
        let gateway = KhaltiGateway::new(
            KhaltiConfig::mock(),
            Client::new(),
            CallbackUrls::default(),
        );
        let err = gateway
            .initiate(&donation(), PaymentMode::Live)
            .await
            .unwrap_err();
        assert!(matches!(err, DonationError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_live_initiate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/initiate/"))
            .and(header("Authorization", format!("Key {TEST_SECRET}").as_str()))
            .and(body_partial_json(serde_json::json!({
                "amount": 50000,
                "purchase_order_id": "don_np_1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pidx": "bZQLD9wRVWo4CdESSfuSsB",
                "payment_url": "https://test-pay.khalti.com/?pidx=bZQLD9wRVWo4CdESSfuSsB",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = live_gateway(&server.uri());
        let result = gateway
            .initiate(&donation(), PaymentMode::Live)
            .await
            .unwrap();
        assert_eq!(result.reference_id, "bZQLD9wRVWo4CdESSfuSsB");
        assert!(result.redirect_url.starts_with("https://test-pay.khalti.com/"));
    }

    #[tokio::test]
    async fn test_live_401_extracts_specific_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/initiate/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "detail": "Invalid token.",
                "error_key": "authentication_error",
            })))
            .mount(&server)
            .await;

        let gateway = live_gateway(&server.uri());
        let err = gateway
            .initiate(&donation(), PaymentMode::Live)
            .await
            .unwrap_err();
        match err {
            DonationError::Provider {
                message,
                status,
                code,
                ..
            } => {
                assert_eq!(message, "Invalid token.");
                assert_eq!(status, Some(401));
                assert_eq!(code.as_deref(), Some("authentication_error"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_live_2xx_missing_fields_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/initiate/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "payment_url": "https://test-pay.khalti.com/?pidx=x",
            })))
            .mount(&server)
            .await;

        let gateway = live_gateway(&server.uri());
        let err = gateway
            .initiate(&donation(), PaymentMode::Live)
            .await
            .unwrap_err();
        match err {
            DonationError::MalformedResponse { message, .. } => {
                assert!(message.contains("pidx"));
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lookup_mock_accepts_only_mock_shape() {
        let gateway = mock_gateway();
        let ok = gateway.lookup("mock_pidx_don_np_1", PaymentMode::Mock).await;
        assert!(ok.success);
        assert_eq!(ok.session.unwrap()["status"], "Completed");

        let bad = gateway.lookup("bZQLD9wRVWo4", PaymentMode::Mock).await;
        assert!(!bad.success);
        assert_eq!(bad.status_code, Some(404));
    }

    #[tokio::test]
    async fn test_lookup_live_reports_pending_as_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/lookup/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pidx": "bZQLD9wRVWo4CdESSfuSsB",
                "status": "Pending",
                "total_amount": 50000,
            })))
            .mount(&server)
            .await;

        let gateway = live_gateway(&server.uri());
        let result = gateway
            .lookup("bZQLD9wRVWo4CdESSfuSsB", PaymentMode::Live)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Pending"));
        assert!(result.session.is_some());
    }

    #[tokio::test]
    async fn test_lookup_live_completed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/epayment/lookup/"))
            .and(body_partial_json(serde_json::json!({"pidx": "bZQLD9wRVWo4CdESSfuSsB"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pidx": "bZQLD9wRVWo4CdESSfuSsB",
                "status": "Completed",
                "total_amount": 50000,
            })))
            .mount(&server)
            .await;

        let gateway = live_gateway(&server.uri());
        let result = gateway
            .lookup("bZQLD9wRVWo4CdESSfuSsB", PaymentMode::Live)
            .await;
        assert!(result.success);
    }
}

//! # Stripe Checkout Sessions
//!
//! Card-checkout adapter. One-time donations create a Checkout Session
//! directly with inline price data; monthly donations create a product,
//! then a recurring price tied to it, then a session in subscription
//! mode. The donation id rides along as `client_reference_id` and
//! session metadata so verification can recover it.
//!
//! Mock mode fabricates a `cs_test_mock_<donation_id>` session with no
//! network call and no secrets.

use crate::config::StripeConfig;
use async_trait::async_trait;
use donate_core::{
    log_payment_event, send_with_timeout, to_minor_units, CallbackUrls, DonationContext,
    DonationError, DonationGateway, DonationResult, InitiationResult, PaymentMode, Provider,
    VerificationResult, DEFAULT_TIMEOUT,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, Level};

/// Shape of every mock-generated session identifier
pub const MOCK_SESSION_PREFIX: &str = "cs_test_mock_";

/// Stripe Checkout gateway.
///
/// The HTTP client is constructed by the composition root and injected;
/// there is no lazily-initialized module-level client.
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
    urls: CallbackUrls,
}

impl StripeGateway {
    pub fn new(config: StripeConfig, client: Client, urls: CallbackUrls) -> Self {
        Self {
            config,
            client,
            urls,
        }
    }

    /// Convenience constructor for the common case: config and callback
    /// URLs from the environment, a fresh client.
    pub fn from_env(mode: PaymentMode) -> DonationResult<Self> {
        Ok(Self::new(
            StripeConfig::from_env(mode)?,
            Client::new(),
            CallbackUrls::from_env(),
        ))
    }

    fn mock_session_id(donation_id: &str) -> String {
        format!("{MOCK_SESSION_PREFIX}{donation_id}")
    }

    fn mock_initiate(&self, donation: &DonationContext) -> InitiationResult {
        let session_id = Self::mock_session_id(&donation.id);
        let redirect_url = format!(
            "{}/donate/mock-checkout?session_id={}",
            self.urls.base_url, session_id
        );
        log_payment_event(
            "stripe_checkout_mocked",
            &[
                ("donation_id", donation.id.clone()),
                ("session_id", session_id.clone()),
            ],
            Level::INFO,
        );
        InitiationResult::new(Provider::Stripe, redirect_url, session_id)
    }

    /// POST a form-encoded request to the Stripe API and parse the
    /// response. The idempotency key is derived deterministically from
    /// the donation id so a repeated initiation cannot double-charge.
    async fn post_form<T>(
        &self,
        path: &str,
        donation_id: &str,
        idempotency_suffix: &str,
        form: &[(String, String)],
    ) -> DonationResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.config.api_base_url, path);
        let request = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header(
                "Idempotency-Key",
                format!("donation-{donation_id}-{idempotency_suffix}"),
            )
            .form(form);

        let response = send_with_timeout(Provider::Stripe, request, &url, DEFAULT_TIMEOUT).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| DonationError::Network {
            provider: Provider::Stripe,
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let (message, code) = match serde_json::from_str::<StripeErrorResponse>(&body) {
                Ok(parsed) => (parsed.error.message, parsed.error.code),
                Err(_) => (format!("HTTP {status}: {body}"), None),
            };
            log_payment_event(
                "stripe_api_error",
                &[
                    ("donation_id", donation_id.to_string()),
                    ("url", url.clone()),
                    ("status", status.as_u16().to_string()),
                    ("message", message.clone()),
                ],
                Level::ERROR,
            );
            return Err(DonationError::provider(
                Provider::Stripe,
                message,
                Some(status.as_u16()),
                code,
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            DonationError::Serialization(format!("failed to parse Stripe response: {e}"))
        })
    }

    async fn create_product(&self, donation: &DonationContext) -> DonationResult<String> {
        let form = vec![
            ("name".to_string(), "Monthly donation".to_string()),
            (
                "metadata[donation_id]".to_string(),
                donation.id.clone(),
            ),
        ];
        let product: StripeProductResponse = self
            .post_form("/v1/products", &donation.id, "product", &form)
            .await?;
        debug!("created Stripe product {}", product.id);
        Ok(product.id)
    }

    async fn create_recurring_price(
        &self,
        donation: &DonationContext,
        product_id: &str,
        minor_amount: i64,
    ) -> DonationResult<String> {
        let form = vec![
            ("product".to_string(), product_id.to_string()),
            ("unit_amount".to_string(), minor_amount.to_string()),
            (
                "currency".to_string(),
                donation.currency.as_str().to_lowercase(),
            ),
            ("recurring[interval]".to_string(), "month".to_string()),
        ];
        let price: StripePriceResponse = self
            .post_form("/v1/prices", &donation.id, "price", &form)
            .await?;
        debug!("created Stripe price {}", price.id);
        Ok(price.id)
    }

    #[instrument(skip(self, donation), fields(donation_id = %donation.id))]
    async fn live_initiate(&self, donation: &DonationContext) -> DonationResult<InitiationResult> {
        let minor_amount = to_minor_units(donation.amount)?;
        let success_url = self
            .urls
            .success_url_with("session_id", "{CHECKOUT_SESSION_ID}");
        let cancel_url = self.urls.failure_url();

        let mut form: Vec<(String, String)> = vec![
            ("success_url".to_string(), success_url),
            ("cancel_url".to_string(), cancel_url),
            ("client_reference_id".to_string(), donation.id.clone()),
            ("customer_email".to_string(), donation.donor_email.clone()),
            ("metadata[donation_id]".to_string(), donation.id.clone()),
        ];

        if donation.is_recurring() {
            let product_id = self.create_product(donation).await?;
            let price_id = self
                .create_recurring_price(donation, &product_id, minor_amount)
                .await?;
            form.push(("mode".to_string(), "subscription".to_string()));
            form.push(("line_items[0][price]".to_string(), price_id));
            form.push(("line_items[0][quantity]".to_string(), "1".to_string()));
        } else {
            form.push(("mode".to_string(), "payment".to_string()));
            form.push((
                "line_items[0][price_data][currency]".to_string(),
                donation.currency.as_str().to_lowercase(),
            ));
            form.push((
                "line_items[0][price_data][unit_amount]".to_string(),
                minor_amount.to_string(),
            ));
            form.push((
                "line_items[0][price_data][product_data][name]".to_string(),
                "One-time donation".to_string(),
            ));
            form.push(("line_items[0][quantity]".to_string(), "1".to_string()));
        }

        let session: StripeSessionResponse = self
            .post_form("/v1/checkout/sessions", &donation.id, "session", &form)
            .await?;

        let redirect_url = session.url.ok_or_else(|| DonationError::MalformedResponse {
            provider: Provider::Stripe,
            message: format!("session {} has no checkout url", session.id),
        })?;

        log_payment_event(
            "stripe_checkout_created",
            &[
                ("donation_id", donation.id.clone()),
                ("session_id", session.id.clone()),
                ("amount_minor", minor_amount.to_string()),
                ("recurring", donation.is_recurring().to_string()),
            ],
            Level::INFO,
        );

        Ok(InitiationResult::new(
            Provider::Stripe,
            redirect_url,
            session.id,
        ))
    }

    /// Check a previously-initiated session.
    ///
    /// Result-shaped on purpose: session-not-found is a 404-class
    /// result and every other failure a 500-class result, never an Err.
    pub async fn verify_session(
        &self,
        session_id: &str,
        mode: PaymentMode,
    ) -> VerificationResult {
        match mode {
            PaymentMode::Mock => self.verify_mock_session(session_id),
            PaymentMode::Live => self.verify_live_session(session_id).await,
        }
    }

    fn verify_mock_session(&self, session_id: &str) -> VerificationResult {
        match session_id.strip_prefix(MOCK_SESSION_PREFIX) {
            Some(donation_id) if !donation_id.is_empty() => {
                VerificationResult::succeeded(serde_json::json!({
                    "id": session_id,
                    "object": "checkout.session",
                    "status": "complete",
                    "payment_status": "paid",
                    "client_reference_id": donation_id,
                    "metadata": { "donation_id": donation_id },
                }))
            }
            _ => VerificationResult::failed(
                format!("session not found: {session_id}"),
                404,
            ),
        }
    }

    async fn verify_live_session(&self, session_id: &str) -> VerificationResult {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url, session_id
        );
        let request = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .query(&[
                ("expand[]", "payment_intent"),
                ("expand[]", "subscription"),
            ]);

        let response = match send_with_timeout(Provider::Stripe, request, &url, DEFAULT_TIMEOUT).await
        {
            Ok(response) => response,
            Err(e) => return VerificationResult::failed(e.to_string(), 500),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::NOT_FOUND {
            return VerificationResult::failed(format!("session not found: {session_id}"), 404);
        }
        if !status.is_success() {
            let message = match serde_json::from_str::<StripeErrorResponse>(&body) {
                Ok(parsed) => parsed.error.message,
                Err(_) => format!("HTTP {status}"),
            };
            log_payment_event(
                "stripe_verify_failed",
                &[
                    ("session_id", session_id.to_string()),
                    ("status", status.as_u16().to_string()),
                    ("message", message.clone()),
                ],
                Level::ERROR,
            );
            return VerificationResult::failed(message, 500);
        }

        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(session) => VerificationResult::succeeded(session),
            Err(e) => VerificationResult::failed(format!("unparseable session body: {e}"), 500),
        }
    }
}

#[async_trait]
impl DonationGateway for StripeGateway {
    async fn initiate(
        &self,
        donation: &DonationContext,
        mode: PaymentMode,
    ) -> DonationResult<InitiationResult> {
        match mode {
            PaymentMode::Mock => Ok(self.mock_initiate(donation)),
            PaymentMode::Live => self.live_initiate(donation).await,
        }
    }

    fn provider(&self) -> Provider {
        Provider::Stripe
    }

    fn supports_recurring(&self) -> bool {
        true
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeProductResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripePriceResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeApiError,
}

#[derive(Debug, Deserialize)]
struct StripeApiError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use donate_core::Currency;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_gateway() -> StripeGateway {
        StripeGateway::new(
            StripeConfig::mock(),
            Client::new(),
            CallbackUrls::default(),
        )
    }

    fn test_gateway(base_url: &str) -> StripeGateway {
        StripeGateway::new(
            StripeConfig::new("sk_test_abc123").with_api_base_url(base_url),
            Client::new(),
            CallbackUrls::new("https://sahayog.org.np"),
        )
    }

    fn one_time_donation() -> DonationContext {
        DonationContext::new(
            "don_123",
            dec!(25.00),
            Currency::Usd,
            "Asha Gurung",
            "asha@example.org",
        )
    }

    #[tokio::test]
    async fn test_mock_initiate_and_verify_round_trip() {
        let gateway = mock_gateway();
        let result = gateway
            .initiate(&one_time_donation(), PaymentMode::Mock)
            .await
            .unwrap();

        assert_eq!(result.reference_id, "cs_test_mock_don_123");
        assert!(result.redirect_url.contains("cs_test_mock_don_123"));

        let verification = gateway
            .verify_session(&result.reference_id, PaymentMode::Mock)
            .await;
        assert!(verification.success);
        let session = verification.session.unwrap();
        assert_eq!(session["metadata"]["donation_id"], "don_123");
        assert_eq!(session["payment_status"], "paid");
    }

    #[tokio::test]
    async fn test_mock_verify_rejects_foreign_session_shape() {
        let gateway = mock_gateway();
        let verification = gateway
            .verify_session("cs_live_abcdef", PaymentMode::Mock)
            .await;
        assert!(!verification.success);
        assert_eq!(verification.status_code, Some(404));
    }

    #[tokio::test]
    async fn test_live_one_time_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("mode=payment"))
            .and(body_string_contains("unit_amount%5D=2500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_live_1",
                "url": "https://checkout.stripe.com/c/pay/cs_live_1",
            })))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let result = gateway
            .initiate(&one_time_donation(), PaymentMode::Live)
            .await
            .unwrap();
        assert_eq!(result.reference_id, "cs_live_1");
        assert_eq!(
            result.redirect_url,
            "https://checkout.stripe.com/c/pay/cs_live_1"
        );
    }

    #[tokio::test]
    async fn test_live_recurring_creates_product_then_price_then_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/products"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "prod_1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/prices"))
            .and(body_string_contains("product=prod_1"))
            .and(body_string_contains("recurring%5Binterval%5D=month"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "price_1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("mode=subscription"))
            .and(body_string_contains("price%5D=price_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_live_sub",
                "url": "https://checkout.stripe.com/c/pay/cs_live_sub",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let donation = one_time_donation().monthly();
        let result = gateway.initiate(&donation, PaymentMode::Live).await.unwrap();
        assert_eq!(result.reference_id, "cs_live_sub");
    }

    #[tokio::test]
    async fn test_live_error_carries_status_and_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": {"message": "Your card was declined.", "code": "card_declined"},
            })))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let err = gateway
            .initiate(&one_time_donation(), PaymentMode::Live)
            .await
            .unwrap_err();
        match err {
            DonationError::Provider {
                provider,
                status,
                code,
                ..
            } => {
                assert_eq!(provider, Provider::Stripe);
                assert_eq!(status, Some(402));
                assert_eq!(code.as_deref(), Some("card_declined"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_live_session_without_url_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "cs_live_2"})),
            )
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let err = gateway
            .initiate(&one_time_donation(), PaymentMode::Live)
            .await
            .unwrap_err();
        assert!(matches!(err, DonationError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_live_verify_maps_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"message": "No such checkout.session"},
            })))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let verification = gateway
            .verify_session("cs_live_missing", PaymentMode::Live)
            .await;
        assert!(!verification.success);
        assert_eq!(verification.status_code, Some(404));
    }
}

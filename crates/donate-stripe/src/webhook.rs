//! # Stripe Webhook Verification
//!
//! The callback endpoint itself lives outside this layer; this module
//! is what it must run before trusting a payload: signature-header
//! parsing, HMAC-SHA256 verification with a timestamp tolerance, and
//! extraction of the completed-checkout fields needed to mark a
//! donation paid.

use chrono::Utc;
use donate_core::{DonationError, DonationResult};
use serde::Deserialize;

/// Maximum accepted age of a signed payload (replay window)
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> DonationResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let kv: Vec<&str> = part.trim().split('=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0] {
            "t" => timestamp = kv[1].parse().ok(),
            "v1" => signatures.push(kv[1].to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        DonationError::Validation("webhook signature header is missing a timestamp".to_string())
    })?;
    if signatures.is_empty() {
        return Err(DonationError::Validation(
            "webhook signature header carries no v1 signature".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn compute_hmac_sha256(secret: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verify a webhook payload against its `Stripe-Signature` header.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str) -> DonationResult<()> {
    verify_signature_at(payload, header, secret, Utc::now().timestamp())
}

fn verify_signature_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> DonationResult<()> {
    let parsed = parse_signature_header(header)?;

    if (now - parsed.timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(DonationError::Validation(
            "webhook timestamp outside tolerance".to_string(),
        ));
    }

    let signed_payload = format!("{}.{}", parsed.timestamp, String::from_utf8_lossy(payload));
    let expected = compute_hmac_sha256(secret, &signed_payload);

    if parsed
        .signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected))
    {
        Ok(())
    } else {
        Err(DonationError::Validation(
            "webhook signature mismatch".to_string(),
        ))
    }
}

/// Fields the callback needs from a `checkout.session.completed` event
#[derive(Debug, Clone)]
pub struct CompletedCheckout {
    pub session_id: String,
    /// Donation id recovered from session metadata
    pub donation_id: Option<String>,
    /// Amount in minor units as Stripe reports it
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: String,
}

impl CompletedCheckout {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: serde_json::Value,
}

/// Parse a verified payload, returning the completed-checkout fields
/// when the event is `checkout.session.completed` and `None` for every
/// other event type.
pub fn parse_completed_checkout(payload: &[u8]) -> DonationResult<Option<CompletedCheckout>> {
    let envelope: WebhookEnvelope = serde_json::from_slice(payload)
        .map_err(|e| DonationError::Serialization(format!("unparseable webhook payload: {e}")))?;

    if envelope.event_type != "checkout.session.completed" {
        return Ok(None);
    }

    let object = &envelope.data.object;
    let session_id = object
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            DonationError::Serialization("completed session is missing an id".to_string())
        })?
        .to_string();

    let donation_id = object
        .get("metadata")
        .and_then(|m| m.get("donation_id"))
        .and_then(|v| v.as_str())
        .map(String::from)
        .or_else(|| {
            object
                .get("client_reference_id")
                .and_then(|v| v.as_str())
                .map(String::from)
        });

    Ok(Some(CompletedCheckout {
        session_id,
        donation_id,
        amount_total: object.get("amount_total").and_then(|v| v.as_i64()),
        currency: object
            .get("currency")
            .and_then(|v| v.as_str())
            .map(String::from),
        payment_status: object
            .get("payment_status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
    }))
}

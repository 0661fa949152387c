//! # Timeout-Wrapped HTTP
//!
//! Every live-mode provider call goes through [`send_with_timeout`], so
//! no single donation attempt can stall the calling request. On timeout
//! the provider-side state is unknown; the caller gets a timeout error
//! naming the URL and duration and must let the donor retry. No retries
//! happen at this layer.

use crate::error::{DonationError, DonationResult};
use crate::gateway::Provider;
use std::time::Duration;

/// Default timeout for provider calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Race a provider request against a timer; whichever settles first
/// wins. Transport failures surface as `Network`, the timer as
/// `Timeout`. Dropping the returned future aborts the in-flight call.
pub async fn send_with_timeout(
    provider: Provider,
    request: reqwest::RequestBuilder,
    url: &str,
    timeout: Duration,
) -> DonationResult<reqwest::Response> {
    match tokio::time::timeout(timeout, request.send()).await {
        Err(_) => Err(DonationError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
        Ok(Err(e)) => Err(DonationError::Network {
            provider,
            message: e.to_string(),
        }),
        Ok(Ok(response)) => Ok(response),
    }
}

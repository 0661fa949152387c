//! # Security Kit
//!
//! Masking and logging helpers. `log_payment_event` is the single path
//! adapter code uses to log, so secret-bearing fields are masked before
//! any `tracing` macro sees them, even when a caller passes a secret by
//! mistake.

use tracing::Level;

/// A log field key containing any of these substrings (case-insensitive)
/// gets its value masked.
pub const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "secret",
    "key",
    "password",
    "token",
    "authorization",
    "card",
    "cvv",
    "pin",
];

/// Longest string value allowed into a log line before truncation
const MAX_LOG_VALUE_LEN: usize = 100;

/// Mask a sensitive value for diagnostics: `"****"` for anything of
/// four characters or fewer, otherwise first-2 + `****` + last-2.
pub fn mask_sensitive(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}****{tail}")
}

fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

/// Mask denylisted keys and truncate oversized values.
pub fn sanitize_log_fields(fields: &[(&str, String)]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(key, value)| {
            let safe = if is_sensitive_key(key) {
                mask_sensitive(value)
            } else if value.chars().count() > MAX_LOG_VALUE_LEN {
                let truncated: String = value.chars().take(MAX_LOG_VALUE_LEN).collect();
                format!("{truncated}...")
            } else {
                value.clone()
            };
            (key.to_string(), safe)
        })
        .collect()
}

/// Log a payment event with masked fields at the given level.
pub fn log_payment_event(event: &str, fields: &[(&str, String)], level: Level) {
    let detail = sanitize_log_fields(fields)
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");

    if level == Level::ERROR {
        tracing::error!(target: "donate_gate", "{event}: {detail}");
    } else if level == Level::WARN {
        tracing::warn!(target: "donate_gate", "{event}: {detail}");
    } else if level == Level::DEBUG {
        tracing::debug!(target: "donate_gate", "{event}: {detail}");
    } else {
        tracing::info!(target: "donate_gate", "{event}: {detail}");
    }
}

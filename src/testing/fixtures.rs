//! Pre-built test data

use crate::settings::SignonSettings;
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;

/// Build an unsigned three-segment JWT carrying the given payload
///
/// The signature segment is a placeholder; these tokens exercise the
/// normalizers, which never verify signatures.
#[must_use]
pub fn make_id_token(payload: &Value) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.test-signature")
}

/// Redirect fragment as Google's implicit flow returns it
#[must_use]
pub fn google_fragment(id_token: &str) -> String {
    format!("#id_token={id_token}&access_token=test-access-token&token_type=Bearer")
}

/// Redirect fragment as Apple's fragment response mode returns it
#[must_use]
pub fn apple_fragment(id_token: &str, code: Option<&str>) -> String {
    match code {
        Some(code) => format!("#id_token={id_token}&code={code}"),
        None => format!("#id_token={id_token}"),
    }
}

/// Settings tuned for tests: ephemeral relay ports and a short timeout
#[must_use]
pub fn test_settings() -> SignonSettings {
    let mut settings = SignonSettings::default();
    settings.bridge.completion_timeout_secs = 10;
    settings.bridge.poll_interval_ms = 50;
    settings
}

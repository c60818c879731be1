//! Browser redirect bridge
//!
//! Rust rendition of the two-participant popup handshake used by the web
//! sign-in flows. The "popup" is a system browser window navigated to the
//! provider's authorize endpoint with `response_mode=fragment`; the "opener"
//! is a loopback relay server plus a one-shot fragment listener. The provider
//! redirects the browser back to a loopback callback path, where a small
//! relay page polls its own URL fragment until the token marker appears,
//! posts the raw fragment to the relay endpoint and closes itself. The
//! listener accepts exactly one matching fragment and then detaches.
//!
//! Tokens travel in the URL fragment and the loopback relay only, never to
//! any remote server.

pub mod listener;
pub mod popup;
pub mod server;

pub use listener::FragmentListener;
pub use popup::{PopupFeatures, PopupOpener, SystemBrowser};
pub use server::RedirectBridge;

use crate::error::SignInError;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Redirect path markers the relay recognizes, one per provider
pub const CALLBACK_MARKERS: &[&str] = &["google-callback", "apple-callback", "microsoft-callback"];

// Control characters and backslashes have no business in a redirect URI;
// reject them before URL parsing gets a chance to normalize them away
static SUSPICIOUS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x1F\x7F-\x9F\\]").unwrap());

/// Fragment markers that must all be present before a message is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMarkers {
    required: &'static [&'static str],
}

impl TokenMarkers {
    #[must_use]
    pub const fn new(required: &'static [&'static str]) -> Self {
        Self { required }
    }

    /// True when the message carries every required marker
    #[must_use]
    pub fn matches(&self, message: &str) -> bool {
        self.required.iter().all(|marker| message.contains(marker))
    }
}

/// Parse a URL fragment (`#a=1&b=2` or `a=1&b=2`) as query parameters
///
/// Pairs without an `=` are skipped; values are percent-decoded.
#[must_use]
pub fn parse_fragment(fragment: &str) -> Vec<(String, String)> {
    fragment
        .trim_start_matches('#')
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let value = urlencoding::decode(value)
                .map(std::borrow::Cow::into_owned)
                .unwrap_or_else(|_| value.to_string());
            Some((key.to_string(), value))
        })
        .collect()
}

/// Look up a single parameter in a URL fragment
#[must_use]
pub fn fragment_param(fragment: &str, key: &str) -> Option<String> {
    parse_fragment(fragment)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

/// Validate a configured redirect URI before any UI or network action
///
/// The URI must parse, carry no suspicious characters, and contain the
/// provider's callback path marker.
///
/// # Errors
///
/// Returns [`SignInError::Configuration`] describing the first failed check.
pub fn validate_redirect_uri(redirect_uri: &str, marker: &str) -> Result<Url, SignInError> {
    if redirect_uri.is_empty() {
        return Err(SignInError::Configuration(
            "redirect URI must not be empty".to_string(),
        ));
    }

    if SUSPICIOUS_PATTERN.is_match(redirect_uri) {
        return Err(SignInError::Configuration(format!(
            "redirect URI contains suspicious characters: {redirect_uri}"
        )));
    }

    if !redirect_uri.contains(marker) {
        return Err(SignInError::Configuration(format!(
            "redirect URI {redirect_uri} does not contain the expected callback path {marker}"
        )));
    }

    Url::parse(redirect_uri).map_err(|e| {
        SignInError::Configuration(format!("invalid redirect URI {redirect_uri}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_require_all_tokens() {
        let markers = TokenMarkers::new(&["id_token", "access_token"]);

        assert!(markers.matches("#id_token=a&access_token=b"));
        assert!(!markers.matches("#id_token=a"));
        assert!(!markers.matches("#access_token=b&state=x"));
        assert!(!markers.matches("unrelated message"));
    }

    #[test]
    fn test_parse_fragment_decodes_parameters() {
        let params = parse_fragment("#id_token=abc&redirect=https%3A%2F%2Fapp%2Fcb&flag");

        assert_eq!(
            params,
            vec![
                ("id_token".to_string(), "abc".to_string()),
                ("redirect".to_string(), "https://app/cb".to_string()),
            ]
        );
    }

    #[test]
    fn test_fragment_param_lookup() {
        let fragment = "#id_token=X&access_token=Y";
        assert_eq!(fragment_param(fragment, "id_token"), Some("X".to_string()));
        assert_eq!(fragment_param(fragment, "access_token"), Some("Y".to_string()));
        assert_eq!(fragment_param(fragment, "code"), None);
    }

    #[test]
    fn test_validate_redirect_uri_requires_marker() {
        let err = validate_redirect_uri("http://127.0.0.1:0/other", "google-callback").unwrap_err();
        assert!(err.is_configuration());

        let url =
            validate_redirect_uri("http://127.0.0.1:0/google-callback", "google-callback").unwrap();
        assert_eq!(url.path(), "/google-callback");
    }

    #[test]
    fn test_validate_redirect_uri_rejects_suspicious_input() {
        assert!(validate_redirect_uri("http://127.0.0.1/goo\\gle-callback", "google-callback")
            .is_err());
        assert!(validate_redirect_uri("", "google-callback").is_err());
        assert!(validate_redirect_uri("http://127.0.0.1/\x01google-callback", "google-callback")
            .is_err());
    }
}

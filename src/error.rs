//! Sign-in error taxonomy
//!
//! Every failure a launcher can produce surfaces through the same one-shot
//! result channel as one of these variants. Callers that want to suppress
//! error UI for user-initiated aborts can branch on [`SignInError::is_cancellation`].

use crate::token::TokenParseError;
use thiserror::Error;

/// Errors surfaced by sign-in launchers, normalizers and the redirect bridge
#[derive(Debug, Error)]
pub enum SignInError {
    /// Missing or empty configuration, detected before any UI or network action
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The user explicitly aborted the provider's sign-in UI
    #[error("sign-in cancelled by user")]
    Cancelled,

    /// The browser popup could not be opened
    #[error("popup blocked")]
    PopupBlocked,

    /// Provider or transport failure (SDK error, relay failure, missing tokens)
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider responded without the identity token the flow requires
    #[error("no identity token returned by {0}")]
    MissingToken(&'static str),

    /// The returned identity token could not be decoded
    #[error("token parse failed: {0}")]
    TokenParse(#[from] TokenParseError),

    /// A callback arrived that no pending sign-in attempt can account for
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The redirect bridge gave up waiting for a fragment
    #[error("sign-in timed out after {0} seconds")]
    Timeout(u64),
}

impl SignInError {
    /// Build a configuration error naming the setup call the host skipped
    #[must_use]
    pub fn not_configured(holder: &str) -> Self {
        Self::Configuration(format!(
            "{holder} is not configured. Call {holder}::configure(..) at app startup."
        ))
    }

    /// True for user-initiated aborts, which callers typically surface without an error banner
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True when the failure was detected before any UI or network action
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_names_setup_call() {
        let err = SignInError::not_configured("GoogleSignInConfigHolder");
        let message = err.to_string();
        assert!(message.contains("GoogleSignInConfigHolder"));
        assert!(message.contains("configure"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_cancellation_is_distinguishable() {
        assert!(SignInError::Cancelled.is_cancellation());
        assert!(!SignInError::PopupBlocked.is_cancellation());
        assert!(!SignInError::Provider("boom".into()).is_cancellation());
        assert!(!SignInError::Configuration("missing client id".into()).is_cancellation());
    }

    #[test]
    fn test_parse_error_converts() {
        let err: SignInError = TokenParseError::SegmentCount(2).into();
        assert!(matches!(err, SignInError::TokenParse(_)));
    }
}

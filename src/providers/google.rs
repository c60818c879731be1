//! Google sign-in
//!
//! Two launch paths share the normalizer here: the browser popup flow, which
//! receives tokens in a URL fragment, and the credential-broker flow used on
//! hosts with an OS-level account broker. The broker path prefers the broker
//! API and falls back to a legacy account picker on any error other than an
//! explicit user cancellation.

use crate::error::SignInError;
use crate::models::{GoogleSignInResult, Platform};
use crate::token::Claims;
use crate::{bridge, config::ConfigHolder};
use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use thiserror::Error;
use url::Url;

/// Google's OAuth 2.0 authorize endpoint
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google sign-in configuration
///
/// `web_client_id` is required on every path (the broker request carries it
/// as the server client id); `redirect_uri` only for the browser popup flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoogleSignInConfig {
    pub web_client_id: Option<String>,
    pub ios_client_id: Option<String>,
    pub redirect_uri: Option<String>,
}

impl GoogleSignInConfig {
    /// The web client id, required and non-empty
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::Configuration`] when missing or empty.
    pub fn web_client_id(&self) -> Result<&str, SignInError> {
        match self.web_client_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(SignInError::Configuration(
                "missing webClientId in Google sign-in config".to_string(),
            )),
        }
    }

    /// The redirect URI, required for the browser popup flow
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::Configuration`] when missing or empty.
    pub fn redirect_uri(&self) -> Result<&str, SignInError> {
        match self.redirect_uri.as_deref() {
            Some(uri) if !uri.is_empty() => Ok(uri),
            _ => Err(SignInError::Configuration(
                "missing redirectUri in Google sign-in config".to_string(),
            )),
        }
    }
}

/// Fresh holder for Google configuration
#[must_use]
pub fn config_holder() -> ConfigHolder<GoogleSignInConfig> {
    ConfigHolder::new("GoogleSignInConfigHolder")
}

/// Additional scopes a host can request beyond `openid`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleSignInRequestScope {
    Email,
    Profile,
}

/// Space-separated scope string: `openid` plus the requested extras
#[must_use]
pub fn scope_string(scopes: &[GoogleSignInRequestScope]) -> String {
    let mut parts = vec!["openid"];
    for scope in scopes {
        let name = match scope {
            GoogleSignInRequestScope::Email => "email",
            GoogleSignInRequestScope::Profile => "profile",
        };
        if !parts.contains(&name) {
            parts.push(name);
        }
    }
    parts.join(" ")
}

/// Random 16-character alphanumeric nonce for the implicit flow request
#[must_use]
pub fn generate_nonce() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    (0..16)
        .map(|_| char::from(CHARSET[rng.random_range(0..CHARSET.len())]))
        .collect()
}

/// Build the authorize URL for the browser popup flow
///
/// Tokens come back in the URL fragment (`response_mode=fragment`), so they
/// never reach any server.
///
/// # Errors
///
/// Returns [`SignInError::Configuration`] when the endpoint cannot be
/// combined with the given parameters into a valid URL.
pub fn authorize_url(
    client_id: &str,
    redirect_uri: &str,
    scopes: &[GoogleSignInRequestScope],
    nonce: &str,
) -> Result<Url, SignInError> {
    Url::parse_with_params(
        AUTHORIZE_ENDPOINT,
        &[
            ("response_type", "id_token token"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", &scope_string(scopes)),
            ("nonce", nonce),
            ("prompt", "select_account"),
            ("response_mode", "fragment"),
        ],
    )
    .map_err(|e| SignInError::Configuration(format!("invalid Google authorize URL: {e}")))
}

/// Normalize a redirect fragment into a [`GoogleSignInResult`]
///
/// # Errors
///
/// Returns [`SignInError::MissingToken`] when the fragment carries no
/// `id_token`, or [`SignInError::TokenParse`] when the token is malformed.
pub fn from_fragment(fragment: &str, platform: Platform) -> Result<GoogleSignInResult, SignInError> {
    let id_token =
        bridge::fragment_param(fragment, "id_token").ok_or(SignInError::MissingToken("google"))?;

    let claims = Claims::from_id_token(&id_token)?;
    Ok(GoogleSignInResult {
        user_id: claims.subject().map(str::to_string),
        email: claims.email().map(str::to_string),
        full_name: claims.name(),
        id_token,
        platform,
    })
}

// --- Credential broker path ---

/// Request forwarded to the OS credential broker or the legacy picker
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    pub server_client_id: String,
    pub filter_by_authorized_accounts: bool,
    pub auto_select: bool,
    pub scopes: Vec<GoogleSignInRequestScope>,
}

/// Credential returned by a broker or picker implementation
#[derive(Debug, Clone)]
pub struct BrokerCredential {
    pub id_token: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Failures a broker or picker implementation can report
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The user explicitly dismissed the account UI
    #[error("sign-in cancelled by user")]
    Cancelled,

    /// Anything else: broker unavailable, no matching credentials, SDK error
    #[error("{0}")]
    Failed(String),
}

/// OS-level credential broker (e.g. a platform credential manager)
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    /// Fetch a Google credential through the broker UI
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Cancelled`] for an explicit user abort,
    /// [`BrokerError::Failed`] otherwise.
    async fn get_credential(&self, request: &CredentialRequest)
        -> Result<BrokerCredential, BrokerError>;
}

/// Legacy account-picker fallback
///
/// Implementations sign out any previously selected account in
/// [`AccountPicker::sign_out`] before the picker is shown, so a stale
/// selection is never silently reused.
#[async_trait]
pub trait AccountPicker: Send + Sync {
    /// Clear any previously selected account
    async fn sign_out(&self);

    /// Present the account picker UI
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Cancelled`] for an explicit user abort,
    /// [`BrokerError::Failed`] otherwise.
    async fn pick_account(&self, request: &CredentialRequest)
        -> Result<BrokerCredential, BrokerError>;
}

/// Normalize a broker credential into a [`GoogleSignInResult`]
///
/// The subject is recovered from the token on a best-effort basis; a token
/// the broker accepted but this library cannot decode does not fail the
/// sign-in.
#[must_use]
pub fn from_credential(credential: BrokerCredential, platform: Platform) -> GoogleSignInResult {
    let user_id = Claims::from_id_token(&credential.id_token)
        .ok()
        .and_then(|claims| claims.subject().map(str::to_string));

    GoogleSignInResult {
        id_token: credential.id_token,
        user_id,
        email: credential.email,
        full_name: credential.display_name,
        platform,
    }
}

/// Broker-first sign-in with a one-shot legacy fallback
///
/// The broker is tried first. An explicit user cancellation short-circuits
/// without fallback; any other broker error falls back once to the legacy
/// account picker, which signs out any prior selection before prompting.
///
/// # Errors
///
/// Returns [`SignInError::Configuration`] for a missing web client id before
/// any broker call, [`SignInError::Cancelled`] for user aborts on either
/// path, and [`SignInError::Provider`] when the fallback picker fails too.
pub async fn sign_in_with_broker(
    config: &GoogleSignInConfig,
    broker: &dyn CredentialBroker,
    picker: &dyn AccountPicker,
    filter_by_authorized_accounts: bool,
    scopes: &[GoogleSignInRequestScope],
    platform: Platform,
) -> Result<GoogleSignInResult, SignInError> {
    let request = CredentialRequest {
        server_client_id: config.web_client_id()?.to_string(),
        filter_by_authorized_accounts,
        auto_select: false,
        scopes: scopes.to_vec(),
    };

    match broker.get_credential(&request).await {
        Ok(credential) => Ok(from_credential(credential, platform)),
        Err(BrokerError::Cancelled) => Err(SignInError::Cancelled),
        Err(BrokerError::Failed(reason)) => {
            warn!("credential broker failed, falling back to account picker: {reason}");
            picker.sign_out().await;
            debug!("previous account cleared, launching account picker");
            match picker.pick_account(&request).await {
                Ok(credential) => Ok(from_credential(credential, platform)),
                Err(BrokerError::Cancelled) => Err(SignInError::Cancelled),
                Err(BrokerError::Failed(reason)) => Err(SignInError::Provider(reason)),
            }
        }
    }
}

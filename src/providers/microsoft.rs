//! Microsoft sign-in
//!
//! Modeled on the MSAL client surface: a single lazily-created client
//! application instance is reused across launches. The native flow runs a
//! mandatory sign-out-then-sign-in sequence so a prior account is never
//! silently reused; the web flow attempts silent token acquisition and only
//! falls back to an interactive popup on an interaction-required error.

use crate::bridge::{self, PopupFeatures, PopupOpener, RedirectBridge};
use crate::config::ConfigHolder;
use crate::error::SignInError;
use crate::models::{MicrosoftSignInResult, Platform};
use crate::providers::ProviderKind;
use crate::settings::BridgeSettings;
use crate::token::Claims;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Multi-tenant authority the client applications are created against
pub const AUTHORITY: &str = "https://login.microsoftonline.com/common";

/// Scopes requested on every sign-in
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "User.Read"];

/// Authorize endpoint under the common authority
#[must_use]
pub fn authorize_endpoint() -> String {
    format!("{AUTHORITY}/oauth2/v2.0/authorize")
}

/// Token endpoint under the common authority
#[must_use]
pub fn token_endpoint() -> String {
    format!("{AUTHORITY}/oauth2/v2.0/token")
}

/// Microsoft sign-in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MicrosoftSignInConfig {
    pub client_id: String,
    pub redirect_uri: Option<String>,
}

impl MicrosoftSignInConfig {
    /// The client id, required and non-empty
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::Configuration`] when empty.
    pub fn client_id(&self) -> Result<&str, SignInError> {
        if self.client_id.is_empty() {
            return Err(SignInError::Configuration(
                "missing clientId in Microsoft sign-in config".to_string(),
            ));
        }
        Ok(&self.client_id)
    }

    /// The redirect URI, required for the web flow
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::Configuration`] when missing or empty.
    pub fn redirect_uri(&self) -> Result<&str, SignInError> {
        match self.redirect_uri.as_deref() {
            Some(uri) if !uri.is_empty() => Ok(uri),
            _ => Err(SignInError::Configuration(
                "missing redirectUri in Microsoft sign-in config".to_string(),
            )),
        }
    }
}

/// Fresh holder for Microsoft configuration
#[must_use]
pub fn config_holder() -> ConfigHolder<MicrosoftSignInConfig> {
    ConfigHolder::new("MicrosoftSignInConfigHolder")
}

/// An authenticated Microsoft account as the client application knows it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MicrosoftAccount {
    pub username: Option<String>,
    pub tenant_id: Option<String>,
    pub id_token: Option<String>,
}

/// Tokens returned by an acquisition call
#[derive(Debug, Clone)]
pub struct MicrosoftTokenResponse {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub account: MicrosoftAccount,
}

/// Token acquisition request
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub scopes: Vec<String>,
    pub prompt: Option<&'static str>,
}

impl TokenRequest {
    /// Default scopes with account selection forced
    #[must_use]
    pub fn select_account() -> Self {
        Self {
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            prompt: Some("select_account"),
        }
    }

    /// Default scopes with no prompt, for silent acquisition
    #[must_use]
    pub fn silent() -> Self {
        Self {
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            prompt: None,
        }
    }
}

/// Failures a client application can report from token acquisition
#[derive(Debug, Error)]
pub enum AcquireTokenError {
    /// Silent acquisition cannot proceed without user interaction
    #[error("interaction required: {0}")]
    InteractionRequired(String),

    /// The user explicitly dismissed the sign-in UI
    #[error("sign-in cancelled by user")]
    Cancelled,

    /// Anything else, propagated directly
    #[error("{0}")]
    Other(String),
}

/// MSAL-style client application surface
///
/// The shipped implementation is [`BridgeMicrosoftClient`]; native hosts wrap
/// their platform's client application behind this trait.
#[async_trait]
pub trait MicrosoftAuthClient: Send + Sync {
    /// The currently signed-in account, if any
    async fn current_account(&self) -> Option<MicrosoftAccount>;

    /// Sign the current account out
    ///
    /// # Errors
    ///
    /// Returns a description of the failure; callers treat failures as
    /// already-signed-out.
    async fn sign_out(&self) -> Result<(), String>;

    /// Acquire tokens through interactive UI
    ///
    /// # Errors
    ///
    /// Returns an [`AcquireTokenError`] describing the failure.
    async fn acquire_token_interactive(
        &self,
        request: &TokenRequest,
    ) -> Result<MicrosoftTokenResponse, AcquireTokenError>;

    /// Acquire tokens without user interaction, from an established session
    ///
    /// # Errors
    ///
    /// Returns [`AcquireTokenError::InteractionRequired`] when no usable
    /// session exists.
    async fn acquire_token_silent(
        &self,
        request: &TokenRequest,
    ) -> Result<MicrosoftTokenResponse, AcquireTokenError>;
}

/// True when the client application has a signed-in account
pub async fn is_signed_in(client: &dyn MicrosoftAuthClient) -> bool {
    client.current_account().await.is_some()
}

fn map_acquire_error(err: AcquireTokenError) -> SignInError {
    match err {
        AcquireTokenError::Cancelled => SignInError::Cancelled,
        AcquireTokenError::InteractionRequired(msg) | AcquireTokenError::Other(msg) => {
            SignInError::Provider(msg)
        }
    }
}

/// Native sign-in: mandatory sign-out-then-sign-in sequencing
///
/// An active account is signed out first so the interactive prompt never
/// silently reuses it; sign-out failures are logged and treated as
/// already-signed-out. The result fields come from the authenticated account
/// object.
///
/// # Errors
///
/// Returns [`SignInError::Cancelled`] for user aborts and
/// [`SignInError::Provider`] for client application failures.
pub async fn sign_in_native(
    client: &dyn MicrosoftAuthClient,
    platform: Platform,
) -> Result<MicrosoftSignInResult, SignInError> {
    if client.current_account().await.is_some() {
        match client.sign_out().await {
            Ok(()) => debug!("previous Microsoft account signed out"),
            Err(e) => debug!("Microsoft sign-out failed, treating as signed out: {e}"),
        }
    }

    let response = client
        .acquire_token_interactive(&TokenRequest::select_account())
        .await
        .map_err(map_acquire_error)?;

    Ok(MicrosoftSignInResult {
        id_token: response.account.id_token.clone().or(response.id_token),
        access_token: response.access_token,
        email: response.account.username,
        tenant_id: response.account.tenant_id,
        platform,
    })
}

/// Web sign-in: silent acquisition first, interactive popup only on an
/// interaction-required error
///
/// Tenant id and account label come from the id-token claims: `tid`, and
/// `preferred_username` before `email`.
///
/// # Errors
///
/// Returns [`SignInError::Provider`] when either token is missing from the
/// response or the client application fails, [`SignInError::Cancelled`] for
/// user aborts, [`SignInError::TokenParse`] for an undecodable id token.
pub async fn sign_in_web(
    client: &dyn MicrosoftAuthClient,
    platform: Platform,
) -> Result<MicrosoftSignInResult, SignInError> {
    let request = TokenRequest::select_account();

    let response = match client.acquire_token_silent(&request).await {
        Ok(response) => response,
        Err(AcquireTokenError::InteractionRequired(reason)) => {
            info!("silent Microsoft token acquisition requires interaction: {reason}");
            client
                .acquire_token_interactive(&request)
                .await
                .map_err(map_acquire_error)?
        }
        Err(other) => return Err(map_acquire_error(other)),
    };

    let (Some(id_token), Some(access_token)) = (response.id_token, response.access_token) else {
        return Err(SignInError::Provider(
            "missing tokens in Microsoft response".to_string(),
        ));
    };

    let claims = Claims::from_id_token(&id_token)?;
    let tenant_id = claims.tenant_id().map(str::to_string);
    let email = claims.username().map(str::to_string);

    Ok(MicrosoftSignInResult {
        id_token: Some(id_token),
        access_token: Some(access_token),
        email,
        tenant_id,
        platform,
    })
}

/// Build the implicit-flow authorize URL for the interactive popup
///
/// # Errors
///
/// Returns [`SignInError::Configuration`] when the endpoint cannot be
/// combined with the given parameters into a valid URL.
pub fn authorize_url(
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    nonce: &str,
) -> Result<Url, SignInError> {
    Url::parse_with_params(
        &authorize_endpoint(),
        &[
            ("response_type", "id_token token"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", &DEFAULT_SCOPES.join(" ")),
            ("state", state),
            ("nonce", nonce),
            ("prompt", "select_account"),
            ("response_mode", "fragment"),
        ],
    )
    .map_err(|e| SignInError::Configuration(format!("invalid Microsoft authorize URL: {e}")))
}

#[derive(Debug, Clone)]
struct CachedSession {
    account: MicrosoftAccount,
    id_token: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedSession {
    /// Within 5 minutes of expiry the cached token no longer counts
    fn needs_refresh(&self) -> bool {
        self.expires_at
            .map_or(true, |expires_at| expires_at <= Utc::now() + Duration::minutes(5))
    }

    fn to_response(&self) -> MicrosoftTokenResponse {
        MicrosoftTokenResponse {
            id_token: Some(self.id_token.clone()),
            access_token: Some(self.access_token.clone()),
            account: self.account.clone(),
        }
    }
}

#[derive(serde::Deserialize)]
struct RefreshGrantResponse {
    access_token: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Client application backed by the redirect bridge
///
/// Interactive acquisition drives the browser popup handshake; silent
/// acquisition serves the cached session or redeems its refresh token
/// against the token endpoint. Create one per process and reuse it.
pub struct BridgeMicrosoftClient {
    config: MicrosoftSignInConfig,
    bridge_settings: BridgeSettings,
    opener: Arc<dyn PopupOpener>,
    http: reqwest::Client,
    session: Mutex<Option<CachedSession>>,
}

impl BridgeMicrosoftClient {
    /// Create a client application for the given configuration
    #[must_use]
    pub fn new(
        config: MicrosoftSignInConfig,
        bridge_settings: BridgeSettings,
        opener: Arc<dyn PopupOpener>,
    ) -> Self {
        Self {
            config,
            bridge_settings,
            opener,
            http: reqwest::Client::new(),
            session: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<CachedSession> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn store(&self, session: CachedSession) {
        *self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(session);
    }

    async fn run_popup_flow(&self) -> Result<CachedSession, SignInError> {
        let client_id = self.config.client_id()?.to_string();
        let redirect = bridge::validate_redirect_uri(
            self.config.redirect_uri()?,
            ProviderKind::Microsoft.callback_marker(),
        )?;

        let (relay, listener) = RedirectBridge::start(&redirect, &self.bridge_settings)?;
        let state = Uuid::new_v4().to_string();
        let nonce = Uuid::new_v4().to_string();
        let url = authorize_url(&client_id, relay.redirect_uri().as_str(), &state, &nonce)?;

        let opened = self.opener.open(&url, &PopupFeatures::default());
        if let Err(e) = opened {
            relay.shutdown().await;
            return Err(e);
        }

        let outcome = listener
            .await_fragment(ProviderKind::Microsoft.fragment_markers())
            .await;
        relay.shutdown().await;
        let fragment = outcome?;

        let id_token = bridge::fragment_param(&fragment, "id_token")
            .ok_or(SignInError::MissingToken("microsoft"))?;
        let access_token = bridge::fragment_param(&fragment, "access_token")
            .ok_or_else(|| SignInError::Provider("missing tokens in Microsoft response".into()))?;
        let expires_at = bridge::fragment_param(&fragment, "expires_in")
            .and_then(|v| v.parse::<i64>().ok())
            .map(|secs| Utc::now() + Duration::seconds(secs));

        let claims = Claims::from_id_token(&id_token)?;
        let account = MicrosoftAccount {
            username: claims.username().map(str::to_string),
            tenant_id: claims.tenant_id().map(str::to_string),
            id_token: Some(id_token.clone()),
        };

        Ok(CachedSession {
            account,
            id_token,
            access_token,
            refresh_token: None,
            expires_at,
        })
    }

    async fn redeem_refresh_token(
        &self,
        session: &CachedSession,
        refresh_token: &str,
        request: &TokenRequest,
    ) -> anyhow::Result<CachedSession> {
        use anyhow::Context as _;

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", &request.scopes.join(" ")),
        ];

        let response = self
            .http
            .post(token_endpoint())
            .form(&params)
            .send()
            .await
            .context("token refresh request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("token refresh failed with status {}", response.status());
        }

        let grant: RefreshGrantResponse = response
            .json()
            .await
            .context("token refresh response is not valid JSON")?;

        let access_token = grant
            .access_token
            .context("token refresh response has no access token")?;

        Ok(CachedSession {
            account: session.account.clone(),
            id_token: grant.id_token.unwrap_or_else(|| session.id_token.clone()),
            access_token,
            refresh_token: grant.refresh_token.or_else(|| session.refresh_token.clone()),
            expires_at: grant.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }
}

#[async_trait]
impl MicrosoftAuthClient for BridgeMicrosoftClient {
    async fn current_account(&self) -> Option<MicrosoftAccount> {
        self.cached().map(|session| session.account)
    }

    async fn sign_out(&self) -> Result<(), String> {
        let had_account = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .is_some();
        if had_account {
            debug!("cleared cached Microsoft session");
        }
        Ok(())
    }

    async fn acquire_token_interactive(
        &self,
        _request: &TokenRequest,
    ) -> Result<MicrosoftTokenResponse, AcquireTokenError> {
        let session = self.run_popup_flow().await.map_err(|e| match e {
            SignInError::Cancelled => AcquireTokenError::Cancelled,
            other => AcquireTokenError::Other(other.to_string()),
        })?;

        let response = session.to_response();
        self.store(session);
        Ok(response)
    }

    async fn acquire_token_silent(
        &self,
        request: &TokenRequest,
    ) -> Result<MicrosoftTokenResponse, AcquireTokenError> {
        let Some(session) = self.cached() else {
            return Err(AcquireTokenError::InteractionRequired(
                "no account session established".to_string(),
            ));
        };

        if !session.needs_refresh() {
            debug!("serving cached Microsoft tokens");
            return Ok(session.to_response());
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            return Err(AcquireTokenError::InteractionRequired(
                "cached session expired and no refresh token is available".to_string(),
            ));
        };

        match self
            .redeem_refresh_token(&session, &refresh_token, request)
            .await
        {
            Ok(refreshed) => {
                let response = refreshed.to_response();
                self.store(refreshed);
                Ok(response)
            }
            Err(e) => {
                warn!("Microsoft token refresh failed: {e}");
                Err(AcquireTokenError::InteractionRequired(format!(
                    "token refresh failed: {e}"
                )))
            }
        }
    }
}

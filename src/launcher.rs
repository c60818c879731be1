//! Sign-in launchers and one-shot result delivery
//!
//! [`SignInLauncher`] is the capability interface hosts program against: one
//! concrete implementation per target platform, selected by the host
//! application. This crate ships [`WebLauncher`], which drives the browser
//! redirect bridge and fits web-equivalent and desktop targets; native hosts
//! implement the interface over their platform SDK bindings, reusing the
//! orchestration helpers in [`crate::providers`].
//!
//! Result delivery is single-slot and one-shot per provider: arming a new
//! attempt replaces the previous slot rather than queueing behind it, so
//! only the most recent attempt's result is ever delivered.

use crate::bridge::{self, PopupFeatures, PopupOpener, RedirectBridge, SystemBrowser};
use crate::config::ConfigHolder;
use crate::error::SignInError;
use crate::models::{
    AppleSignInResult, GoogleSignInResult, MicrosoftSignInResult, Platform, SignInResult,
};
use crate::providers::apple::{self, AppleSignInConfig, PendingNonce};
use crate::providers::google::{self, GoogleSignInConfig, GoogleSignInRequestScope};
use crate::providers::microsoft::{self, BridgeMicrosoftClient, MicrosoftSignInConfig};
use crate::providers::ProviderKind;
use crate::settings::{BridgeSettings, SignonSettings};
use async_trait::async_trait;
use log::warn;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use url::Url;
use uuid::Uuid;

/// Single-slot one-shot result delivery
///
/// Holds the receiver end for "the callback awaiting the next provider
/// result". Arming replaces any previous slot (the superseded attempt fails
/// with an invalid-state error instead of hanging); resolving fires at most
/// once and later resolutions are logged no-ops.
#[derive(Debug, Default)]
pub struct PendingResult<R> {
    slot: Mutex<Option<oneshot::Sender<Result<R, SignInError>>>>,
}

impl<R> PendingResult<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Arm the slot for the next result, replacing any previous attempt
    pub fn arm(&self) -> oneshot::Receiver<Result<R, SignInError>> {
        let (tx, rx) = oneshot::channel();
        let mut slot = self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.replace(tx).is_some() {
            warn!("replacing pending sign-in result; the superseded attempt will not complete");
        }
        rx
    }

    /// Deliver the result to the armed attempt
    ///
    /// Returns false when nothing was armed or the attempt was superseded.
    pub fn resolve(&self, result: Result<R, SignInError>) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            warn!("sign-in result arrived with no pending attempt, dropping it");
            return false;
        };
        sender.send(result).is_ok()
    }

    /// True while an attempt is awaiting its result
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }
}

/// Capability interface for launching a provider sign-in
///
/// One concrete implementation per target platform, selected by the host
/// application.
#[async_trait]
pub trait SignInLauncher: Send + Sync {
    /// Launch the provider's sign-in UI and wait for its one-shot result
    ///
    /// # Errors
    ///
    /// Returns a [`SignInError`] describing the configuration, cancellation,
    /// provider or parse failure.
    async fn launch(&self, provider: ProviderKind) -> Result<SignInResult, SignInError>;
}

/// Browser-based launcher for web-equivalent and desktop targets
///
/// Drives the redirect bridge for Google and Apple, and a create-once
/// MSAL-style client application for Microsoft.
pub struct WebLauncher {
    google: ConfigHolder<GoogleSignInConfig>,
    apple: ConfigHolder<AppleSignInConfig>,
    microsoft: ConfigHolder<MicrosoftSignInConfig>,
    bridge: BridgeSettings,
    opener: Arc<dyn PopupOpener>,
    microsoft_client: OnceCell<Arc<BridgeMicrosoftClient>>,
    apple_nonce: Arc<PendingNonce>,
    pending_google: Arc<PendingResult<GoogleSignInResult>>,
    pending_apple: Arc<PendingResult<AppleSignInResult>>,
    pending_microsoft: Arc<PendingResult<MicrosoftSignInResult>>,
}

impl WebLauncher {
    /// Launcher opening popups in the system browser
    #[must_use]
    pub fn new(settings: &SignonSettings) -> Self {
        Self::with_opener(settings, Arc::new(SystemBrowser))
    }

    /// Launcher with a custom popup opener (web hosts, tests)
    #[must_use]
    pub fn with_opener(settings: &SignonSettings, opener: Arc<dyn PopupOpener>) -> Self {
        let launcher = Self {
            google: google::config_holder(),
            apple: apple::config_holder(),
            microsoft: microsoft::config_holder(),
            bridge: settings.bridge.clone(),
            opener,
            microsoft_client: OnceCell::new(),
            apple_nonce: Arc::new(PendingNonce::new()),
            pending_google: Arc::new(PendingResult::new()),
            pending_apple: Arc::new(PendingResult::new()),
            pending_microsoft: Arc::new(PendingResult::new()),
        };

        if let Some(config) = settings.google_config() {
            launcher.google.configure(config);
        }
        if let Some(config) = settings.apple_config() {
            launcher.apple.configure(config);
        }
        if let Some(config) = settings.microsoft_config() {
            launcher.microsoft.configure(config);
        }
        launcher
    }

    /// Google configuration holder
    #[must_use]
    pub fn google(&self) -> &ConfigHolder<GoogleSignInConfig> {
        &self.google
    }

    /// Apple configuration holder
    #[must_use]
    pub fn apple(&self) -> &ConfigHolder<AppleSignInConfig> {
        &self.apple
    }

    /// Microsoft configuration holder
    #[must_use]
    pub fn microsoft(&self) -> &ConfigHolder<MicrosoftSignInConfig> {
        &self.microsoft
    }

    /// Launch the Google popup flow
    ///
    /// # Errors
    ///
    /// Fails fast with [`SignInError::Configuration`] before any popup is
    /// opened when the web client id or redirect URI is missing.
    pub async fn sign_in_with_google(
        &self,
        scopes: &[GoogleSignInRequestScope],
    ) -> Result<GoogleSignInResult, SignInError> {
        let config = self.google.get()?;
        let client_id = config.web_client_id()?.to_string();
        let redirect = bridge::validate_redirect_uri(
            config.redirect_uri()?,
            ProviderKind::Google.callback_marker(),
        )?;

        let rx = self.pending_google.arm();
        let pending = Arc::clone(&self.pending_google);
        let opener = Arc::clone(&self.opener);
        let bridge_settings = self.bridge.clone();
        let scopes = scopes.to_vec();
        tokio::spawn(async move {
            let result =
                google_popup_flow(&client_id, &redirect, &scopes, &bridge_settings, &*opener).await;
            pending.resolve(result);
        });

        await_pending(rx).await
    }

    /// Launch the Apple popup flow
    ///
    /// # Errors
    ///
    /// Fails fast with [`SignInError::Configuration`] before any popup is
    /// opened when the service id or redirect URI is missing.
    pub async fn sign_in_with_apple(&self) -> Result<AppleSignInResult, SignInError> {
        let config = self.apple.get()?;
        let client_id = config.service_id()?.to_string();
        let redirect = bridge::validate_redirect_uri(
            config.redirect_uri()?,
            ProviderKind::Apple.callback_marker(),
        )?;

        let rx = self.pending_apple.arm();
        let pending = Arc::clone(&self.pending_apple);
        let opener = Arc::clone(&self.opener);
        let nonce = Arc::clone(&self.apple_nonce);
        let bridge_settings = self.bridge.clone();
        tokio::spawn(async move {
            let result =
                apple_popup_flow(&client_id, &redirect, &nonce, &bridge_settings, &*opener).await;
            pending.resolve(result);
        });

        await_pending(rx).await
    }

    /// Launch the Microsoft web flow (silent first, popup on demand)
    ///
    /// # Errors
    ///
    /// Fails fast with [`SignInError::Configuration`] before any popup is
    /// opened when the client id or redirect URI is missing.
    pub async fn sign_in_with_microsoft(&self) -> Result<MicrosoftSignInResult, SignInError> {
        let client = self.microsoft_client()?;

        let rx = self.pending_microsoft.arm();
        let pending = Arc::clone(&self.pending_microsoft);
        tokio::spawn(async move {
            let result = microsoft::sign_in_web(client.as_ref(), Platform::Web).await;
            pending.resolve(result);
        });

        await_pending(rx).await
    }

    /// The create-once Microsoft client application
    fn microsoft_client(&self) -> Result<Arc<BridgeMicrosoftClient>, SignInError> {
        let client = self.microsoft_client.get_or_try_init(|| {
            let config = self.microsoft.get()?;
            config.client_id()?;
            config.redirect_uri()?;
            Ok::<_, SignInError>(Arc::new(BridgeMicrosoftClient::new(
                config,
                self.bridge.clone(),
                Arc::clone(&self.opener),
            )))
        })?;
        Ok(Arc::clone(client))
    }
}

#[async_trait]
impl SignInLauncher for WebLauncher {
    async fn launch(&self, provider: ProviderKind) -> Result<SignInResult, SignInError> {
        match provider {
            ProviderKind::Google => self
                .sign_in_with_google(&[
                    GoogleSignInRequestScope::Email,
                    GoogleSignInRequestScope::Profile,
                ])
                .await
                .map(SignInResult::Google),
            ProviderKind::Apple => self.sign_in_with_apple().await.map(SignInResult::Apple),
            ProviderKind::Microsoft => self
                .sign_in_with_microsoft()
                .await
                .map(SignInResult::Microsoft),
        }
    }
}

/// Wait on an armed slot, mapping supersession to an invalid-state error
async fn await_pending<R>(
    rx: oneshot::Receiver<Result<R, SignInError>>,
) -> Result<R, SignInError> {
    match rx.await {
        Ok(result) => result,
        Err(_) => Err(SignInError::InvalidState(
            "sign-in superseded by a newer attempt".to_string(),
        )),
    }
}

async fn google_popup_flow(
    client_id: &str,
    redirect: &Url,
    scopes: &[GoogleSignInRequestScope],
    settings: &BridgeSettings,
    opener: &dyn PopupOpener,
) -> Result<GoogleSignInResult, SignInError> {
    let (relay, listener) = RedirectBridge::start(redirect, settings)?;
    let nonce = google::generate_nonce();
    let url = google::authorize_url(client_id, relay.redirect_uri().as_str(), scopes, &nonce)?;

    if let Err(e) = opener.open(&url, &PopupFeatures::default()) {
        relay.shutdown().await;
        return Err(e);
    }

    let outcome = listener
        .await_fragment(ProviderKind::Google.fragment_markers())
        .await;
    relay.shutdown().await;
    google::from_fragment(&outcome?, Platform::Web)
}

async fn apple_popup_flow(
    client_id: &str,
    redirect: &Url,
    nonce: &PendingNonce,
    settings: &BridgeSettings,
    opener: &dyn PopupOpener,
) -> Result<AppleSignInResult, SignInError> {
    let (relay, listener) = RedirectBridge::start(redirect, settings)?;
    let issued = nonce.issue();
    let state = Uuid::new_v4().to_string();
    let url = apple::authorize_url(
        client_id,
        relay.redirect_uri().as_str(),
        &state,
        &issued.hashed,
    )?;

    if let Err(e) = opener.open(&url, &PopupFeatures::default()) {
        relay.shutdown().await;
        let _ = nonce.take();
        return Err(e);
    }

    let outcome = listener
        .await_fragment(ProviderKind::Apple.fragment_markers())
        .await;
    relay.shutdown().await;

    // The nonce clears whether the flow completed or not
    let raw_nonce = nonce.take();
    let fragment = outcome?;
    let Some(raw_nonce) = raw_nonce else {
        return Err(SignInError::InvalidState(
            "a sign-in callback was received, but no sign-in request was sent".to_string(),
        ));
    };

    let result = apple::from_fragment(&fragment, Platform::Web)?;
    apple::verify_embedded_nonce(&result.id_token, &raw_nonce)?;
    Ok(result)
}

//! Apple sign-in
//!
//! The native path builds an authorization request carrying a fresh random
//! nonce, hashed before transmission; the raw nonce parks in a single-slot
//! [`PendingNonce`] until the first completion callback and is cleared after
//! use whether the sign-in succeeded or not. The browser path reuses the
//! fragment handshake from the redirect bridge.
//!
//! Apple only surfaces the user's email and full name on the first consent;
//! later sign-ins omit them and that is not an error.

use crate::error::SignInError;
use crate::models::{AppleSignInResult, FullName, Platform};
use crate::token::Claims;
use crate::{bridge, config::ConfigHolder};
use log::debug;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use url::Url;

/// Apple's authorize endpoint
pub const AUTHORIZE_ENDPOINT: &str = "https://appleid.apple.com/auth/authorize";

/// Apple sign-in configuration
///
/// `service_id` is always required; `redirect_uri` only for the browser flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppleSignInConfig {
    pub service_id: String,
    pub redirect_uri: Option<String>,
}

impl AppleSignInConfig {
    /// The service id, required and non-empty
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::Configuration`] when empty.
    pub fn service_id(&self) -> Result<&str, SignInError> {
        if self.service_id.is_empty() {
            return Err(SignInError::Configuration(
                "missing serviceId in Apple sign-in config".to_string(),
            ));
        }
        Ok(&self.service_id)
    }

    /// The redirect URI, required for the browser flow
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::Configuration`] when missing or empty.
    pub fn redirect_uri(&self) -> Result<&str, SignInError> {
        match self.redirect_uri.as_deref() {
            Some(uri) if !uri.is_empty() => Ok(uri),
            _ => Err(SignInError::Configuration(
                "missing redirectUri in Apple sign-in config".to_string(),
            )),
        }
    }
}

/// Fresh holder for Apple configuration
#[must_use]
pub fn config_holder() -> ConfigHolder<AppleSignInConfig> {
    ConfigHolder::new("AppleSignInConfigHolder")
}

/// Scopes a host can request from Apple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppleSignInRequestScope {
    Email,
    FullName,
}

/// Nonce issued for one authorization request
///
/// The raw value stays on this device; only the SHA-256 hash travels in the
/// request, and the token's `nonce` claim is compared against that hash.
#[derive(Debug, Clone)]
pub struct IssuedNonce {
    pub raw: String,
    pub hashed: String,
}

/// Single-slot pending nonce
///
/// Holds at most one in-flight nonce per launcher. Issuing a new nonce
/// replaces any previous one, so only the most recent request can complete.
#[derive(Debug, Default)]
pub struct PendingNonce {
    slot: Mutex<Option<String>>,
}

impl PendingNonce {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh nonce, park the raw value and return it with its hash
    pub fn issue(&self) -> IssuedNonce {
        let raw = random_nonce_string(32);
        let hashed = sha256_hex(&raw);
        let mut slot = self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.is_some() {
            debug!("replacing pending Apple sign-in nonce");
        }
        *slot = Some(raw.clone());
        IssuedNonce { raw, hashed }
    }

    /// Take the pending raw nonce, clearing the slot
    #[must_use]
    pub fn take(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }

    /// True while a request is in flight
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }
}

/// Random nonce over the characters Apple accepts in a request
#[must_use]
pub fn random_nonce_string(length: usize) -> String {
    const CHARSET: &[u8] =
        b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-._";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(CHARSET[rng.random_range(0..CHARSET.len())]))
        .collect()
}

/// Lowercase hex SHA-256 of the input
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the authorize URL for the browser flow
///
/// # Errors
///
/// Returns [`SignInError::Configuration`] when the endpoint cannot be
/// combined with the given parameters into a valid URL.
pub fn authorize_url(
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    hashed_nonce: &str,
) -> Result<Url, SignInError> {
    Url::parse_with_params(
        AUTHORIZE_ENDPOINT,
        &[
            ("response_type", "code id_token"),
            ("response_mode", "fragment"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("state", state),
            ("nonce", hashed_nonce),
        ],
    )
    .map_err(|e| SignInError::Configuration(format!("invalid Apple authorize URL: {e}")))
}

/// Normalize a redirect fragment into an [`AppleSignInResult`]
///
/// A fragment without `code` still succeeds as long as `id_token` is
/// present; the authorization code is best-effort.
///
/// # Errors
///
/// Returns [`SignInError::MissingToken`] when the fragment carries no
/// `id_token`, or [`SignInError::TokenParse`] when the token is malformed.
pub fn from_fragment(fragment: &str, platform: Platform) -> Result<AppleSignInResult, SignInError> {
    let id_token =
        bridge::fragment_param(fragment, "id_token").ok_or(SignInError::MissingToken("apple"))?;
    let auth_code = bridge::fragment_param(fragment, "code");

    let claims = Claims::from_id_token(&id_token)?;
    Ok(AppleSignInResult {
        user_id: claims.subject().map(str::to_string),
        email: claims.email().map(str::to_string),
        full_name: None,
        auth_code,
        id_token,
        platform,
    })
}

/// Check an identity token's embedded nonce against the pending raw nonce
///
/// The request carried the SHA-256 hash of the raw nonce, so that is what
/// the token echoes back. Tokens without the claim are accepted as-is.
///
/// # Errors
///
/// Returns [`SignInError::InvalidState`] when the embedded nonce does not
/// match the hash of `raw_nonce`.
pub fn verify_embedded_nonce(id_token: &str, raw_nonce: &str) -> Result<(), SignInError> {
    if let Ok(claims) = Claims::from_id_token(id_token) {
        if let Some(embedded) = claims.nonce() {
            if embedded != sha256_hex(raw_nonce) {
                return Err(SignInError::InvalidState(
                    "identity token nonce does not match the pending request".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Credential delivered by a native Apple authorization callback
#[derive(Debug, Clone, Default)]
pub struct AppleIdCredential {
    pub identity_token: Option<String>,
    pub authorization_code: Option<String>,
    pub user: Option<String>,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// Complete a native authorization callback against the pending nonce
///
/// The pending nonce is consumed whether this succeeds or fails. A callback
/// with no nonce pending is an invalid-state error; a token whose `nonce`
/// claim does not match the hash sent with the request is rejected as a
/// replay.
///
/// # Errors
///
/// Returns [`SignInError::InvalidState`] when no request is in flight or the
/// embedded nonce mismatches, [`SignInError::MissingToken`] when the
/// credential carries no identity token.
pub fn complete_authorization(
    pending: &PendingNonce,
    credential: AppleIdCredential,
    platform: Platform,
) -> Result<AppleSignInResult, SignInError> {
    let Some(raw_nonce) = pending.take() else {
        return Err(SignInError::InvalidState(
            "a sign-in callback was received, but no sign-in request was sent".to_string(),
        ));
    };

    let id_token = credential
        .identity_token
        .ok_or(SignInError::MissingToken("apple"))?;

    verify_embedded_nonce(&id_token, &raw_nonce)?;

    let full_name = match (credential.given_name, credential.family_name) {
        (None, None) => None,
        (given_name, family_name) => Some(FullName {
            given_name,
            family_name,
        }),
    };

    Ok(AppleSignInResult {
        id_token,
        auth_code: credential.authorization_code,
        user_id: credential.user,
        email: credential.email,
        full_name,
        platform,
    })
}

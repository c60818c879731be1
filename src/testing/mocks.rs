//! Fake popup openers
//!
//! [`RelayPopupOpener`] plays the popup's part in the bridge handshake
//! without a browser: it reads the redirect URI out of the authorize URL and
//! posts a fragment to the relay endpoint, exactly as the relay page would.
//! [`CapturingOpener`] records the authorize URL and opens nothing.

use crate::bridge::{PopupFeatures, PopupOpener};
use crate::error::SignInError;
use log::debug;
use std::sync::Mutex;
use url::Url;

type FragmentFn = Box<dyn Fn(&Url) -> String + Send + Sync>;

/// Opener that completes the handshake by posting a fragment to the relay
pub struct RelayPopupOpener {
    fragment: FragmentFn,
}

impl RelayPopupOpener {
    /// Always relay the given fragment
    #[must_use]
    pub fn with_fragment(fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        Self {
            fragment: Box::new(move |_| fragment.clone()),
        }
    }

    /// Derive the relayed fragment from the authorize URL (e.g. to echo the
    /// request's nonce back in the token)
    #[must_use]
    pub fn from_auth_url(fragment: impl Fn(&Url) -> String + Send + Sync + 'static) -> Self {
        Self {
            fragment: Box::new(fragment),
        }
    }
}

/// Query parameter lookup on an authorize URL
#[must_use]
pub fn auth_query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

impl PopupOpener for RelayPopupOpener {
    fn open(&self, url: &Url, _features: &PopupFeatures) -> Result<(), SignInError> {
        let redirect = auth_query_param(url, "redirect_uri")
            .and_then(|uri| Url::parse(&uri).ok())
            .ok_or_else(|| {
                SignInError::Provider("authorize URL carries no redirect_uri".to_string())
            })?;

        let relay_endpoint = format!(
            "http://{}:{}/relay",
            redirect.host_str().unwrap_or("127.0.0.1"),
            redirect.port().unwrap_or(80)
        );
        let fragment = (self.fragment)(url);
        debug!("relay opener posting fragment to {relay_endpoint}");

        tokio::spawn(async move {
            let _ = reqwest::Client::new()
                .post(relay_endpoint)
                .body(fragment)
                .send()
                .await;
        });
        Ok(())
    }
}

/// Opener that records authorize URLs and never completes the handshake
#[derive(Default)]
pub struct CapturingOpener {
    urls: Mutex<Vec<Url>>,
}

impl CapturingOpener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorize URLs seen so far
    #[must_use]
    pub fn captured(&self) -> Vec<Url> {
        self.urls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl PopupOpener for CapturingOpener {
    fn open(&self, url: &Url, _features: &PopupFeatures) -> Result<(), SignInError> {
        self.urls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(url.clone());
        Ok(())
    }
}

//! Provider-specific sign-in logic
//!
//! One module per identity provider: configuration, authorize-URL
//! construction, and the normalizers that turn provider responses into the
//! common result shapes.

pub mod apple;
pub mod google;
pub mod microsoft;

use crate::bridge::TokenMarkers;
use std::fmt;

/// The identity providers this library can launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Google,
    Apple,
    Microsoft,
}

impl ProviderKind {
    /// Lowercase provider name used in logs and result tags
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Apple => "apple",
            Self::Microsoft => "microsoft",
        }
    }

    /// Substring the provider's redirect path must contain
    #[must_use]
    pub fn callback_marker(self) -> &'static str {
        match self {
            Self::Google => "google-callback",
            Self::Apple => "apple-callback",
            Self::Microsoft => "microsoft-callback",
        }
    }

    /// Fragment markers that identify a completed sign-in for this provider
    #[must_use]
    pub fn fragment_markers(self) -> TokenMarkers {
        match self {
            Self::Google | Self::Microsoft => TokenMarkers::new(&["id_token", "access_token"]),
            Self::Apple => TokenMarkers::new(&["id_token", "code"]),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

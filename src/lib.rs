#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

//! Cross-platform "Sign in with Google / Apple / Microsoft" flows
//!
//! The library launches the right sign-in flow for the host's platform,
//! normalizes the provider's response into one result shape per provider and
//! delivers it through a one-shot result channel. Identity tokens are
//! decoded, never verified: hosts must verify token signatures server-side
//! before trusting any claim.

/// Version of the signon library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bridge;
pub mod config;
pub mod error;
pub mod launcher;
pub mod models;
pub mod providers;
pub mod settings;
pub mod token;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use config::ConfigHolder;
pub use error::SignInError;
pub use launcher::{PendingResult, SignInLauncher, WebLauncher};
pub use models::{
    AppleSignInResult, FullName, GoogleSignInResult, MicrosoftSignInResult, Platform, SignInResult,
};
pub use providers::ProviderKind;
pub use settings::SignonSettings;

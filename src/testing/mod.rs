//! Testing utilities for signon
//!
//! Fixtures and fakes shared by unit tests and the integration suite:
//!
//! - [`fixtures`] - unsigned token builders, redirect fragments, settings
//! - [`mocks`] - fake popup openers driving the bridge without a browser
//!
//! Available to integration tests through the `testing` feature.

pub mod fixtures;
pub mod mocks;

pub use fixtures::{apple_fragment, google_fragment, make_id_token, test_settings};
pub use mocks::{CapturingOpener, RelayPopupOpener};

/// Common test constants
pub mod constants {
    /// Default test email address
    pub const TEST_EMAIL: &str = "test@example.com";

    /// Default test user name
    pub const TEST_USER_NAME: &str = "Test User";

    /// Default test subject identifier
    pub const TEST_SUBJECT: &str = "123456789";
}

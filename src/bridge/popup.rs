//! Popup window handling and the fragment relay page
//!
//! The popup side of the bridge: how the browser window gets opened, the
//! fixed geometry sign-in popups use, and the relay page the loopback server
//! hands to the browser once the provider redirects back.

use crate::error::SignInError;
use log::debug;
use std::fmt;
use std::process::Command;
use url::Url;

/// Default popup width in CSS pixels
pub const POPUP_WIDTH: i32 = 500;

/// Default popup height in CSS pixels
pub const POPUP_HEIGHT: i32 = 600;

/// Requested popup geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    pub width: i32,
    pub height: i32,
}

impl Default for PopupFeatures {
    fn default() -> Self {
        Self {
            width: POPUP_WIDTH,
            height: POPUP_HEIGHT,
        }
    }
}

impl PopupFeatures {
    /// Window-features string centered on the opener's window geometry
    #[must_use]
    pub fn centered_features(
        &self,
        screen_x: i32,
        screen_y: i32,
        outer_width: i32,
        outer_height: i32,
    ) -> String {
        let left = screen_x + (outer_width - self.width) / 2;
        let top = screen_y + (outer_height - self.height) / 2;
        format!(
            "width={},height={},left={left},top={top},resizable,scrollbars=yes",
            self.width, self.height
        )
    }
}

impl fmt::Display for PopupFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "width={},height={},resizable,scrollbars=yes",
            self.width, self.height
        )
    }
}

/// Capability for opening the sign-in popup
///
/// The shipped implementation spawns the system browser; web hosts supply
/// their own `window.open`-backed implementation, and tests inject fakes.
pub trait PopupOpener: Send + Sync {
    /// Open `url` in a popup window
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::PopupBlocked`] when no window could be opened.
    fn open(&self, url: &Url, features: &PopupFeatures) -> Result<(), SignInError>;
}

/// Opens sign-in popups in the user's default browser
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl PopupOpener for SystemBrowser {
    fn open(&self, url: &Url, features: &PopupFeatures) -> Result<(), SignInError> {
        debug!("opening sign-in popup ({features}): {url}");

        let result = open_command(url.as_str()).spawn();
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("browser launch failed: {e}");
                Err(SignInError::PopupBlocked)
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn open_command(url: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(target_os = "windows")]
fn open_command(url: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", "", url]);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn open_command(url: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(url);
    cmd
}

/// Relay page served at the callback path
///
/// The page polls its own fragment until the token marker appears, posts the
/// raw fragment to the same-origin relay endpoint and closes itself. Reads
/// that throw while a provider page is still loaded are expected and ignored.
#[must_use]
pub fn relay_page(poll_interval_ms: u64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Signing in...</title></head>
<body>
<script>
    const poll = setInterval(() => {{
        try {{
            const hash = location.hash;
            if (hash.includes("id_token")) {{
                clearInterval(poll);
                fetch("/relay", {{ method: "POST", body: hash }})
                    .then(() => window.close());
            }}
        }} catch (e) {{
            // Ignore cross-origin error
        }}
    }}, {poll_interval_ms});
</script>
</body>
</html>
"#
    )
}

//! Library configuration
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables
//! 2. Settings.toml in `SIGNON_SECRETS_DIR` (if specified and exists)
//! 3. Settings.toml in current directory (if exists)
//! 4. Default settings
//!
//! Hosts that configure providers in code can skip the loader entirely and
//! build the per-provider config types directly.

use crate::providers::apple::AppleSignInConfig;
use crate::providers::google::GoogleSignInConfig;
use crate::providers::microsoft::MicrosoftSignInConfig;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SignonSettings {
    pub bridge: BridgeSettings,
    pub logging: LoggingSettings,
    pub google: Option<GoogleSettings>,
    pub apple: Option<AppleSettings>,
    pub microsoft: Option<MicrosoftSettings>,
}

/// Redirect bridge behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// How long a launch waits for the popup to complete, in seconds.
    /// A popup closed without completing otherwise never resolves; 0 disables
    /// the timeout and restores that behavior.
    pub completion_timeout_secs: u64,
    /// Fragment polling interval of the relay page, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            completion_timeout_secs: 300,
            poll_interval_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoogleSettings {
    pub web_client_id: Option<String>,
    pub ios_client_id: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppleSettings {
    pub service_id: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MicrosoftSettings {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
}

impl SignonSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// Also loads a `.env` file when present and initializes the logger.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();
        let _ = env_logger::try_init();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            let toml_content = fs::read_to_string(&default_config_path)?;
            settings = basic_toml::from_str(&toml_content)?;
            log::info!("loaded base settings from {}", default_config_path.display());
        }

        if let Ok(secrets_dir) = std::env::var("SIGNON_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                let secrets_toml_content = fs::read_to_string(&secrets_path)?;
                settings = basic_toml::from_str(&secrets_toml_content)?;
                log::info!("overriding settings from {}", secrets_path.display());
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_bridge_env_overrides(&mut settings.bridge);
        Self::apply_logging_env_overrides(&mut settings.logging);
        Self::apply_provider_env_overrides(settings);
    }

    fn apply_bridge_env_overrides(bridge: &mut BridgeSettings) {
        Self::apply_numeric_env_override(
            "SIGNON_COMPLETION_TIMEOUT_SECS",
            &mut bridge.completion_timeout_secs,
        );
        Self::apply_numeric_env_override("SIGNON_POLL_INTERVAL_MS", &mut bridge.poll_interval_ms);
    }

    fn apply_logging_env_overrides(logging: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging.level = log_level;
        }
    }

    fn apply_provider_env_overrides(settings: &mut Self) {
        if let Ok(value) = std::env::var("GOOGLE_WEB_CLIENT_ID") {
            settings.google.get_or_insert_with(GoogleSettings::default).web_client_id = Some(value);
        }
        if let Ok(value) = std::env::var("GOOGLE_IOS_CLIENT_ID") {
            settings.google.get_or_insert_with(GoogleSettings::default).ios_client_id = Some(value);
        }
        if let Ok(value) = std::env::var("GOOGLE_REDIRECT_URI") {
            settings.google.get_or_insert_with(GoogleSettings::default).redirect_uri = Some(value);
        }
        if let Ok(value) = std::env::var("APPLE_SERVICE_ID") {
            settings.apple.get_or_insert_with(AppleSettings::default).service_id = Some(value);
        }
        if let Ok(value) = std::env::var("APPLE_REDIRECT_URI") {
            settings.apple.get_or_insert_with(AppleSettings::default).redirect_uri = Some(value);
        }
        if let Ok(value) = std::env::var("MICROSOFT_CLIENT_ID") {
            settings.microsoft.get_or_insert_with(MicrosoftSettings::default).client_id =
                Some(value);
        }
        if let Ok(value) = std::env::var("MICROSOFT_REDIRECT_URI") {
            settings.microsoft.get_or_insert_with(MicrosoftSettings::default).redirect_uri =
                Some(value);
        }
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Google configuration from the loaded settings, if any
    #[must_use]
    pub fn google_config(&self) -> Option<GoogleSignInConfig> {
        self.google.as_ref().map(|g| GoogleSignInConfig {
            web_client_id: g.web_client_id.clone(),
            ios_client_id: g.ios_client_id.clone(),
            redirect_uri: g.redirect_uri.clone(),
        })
    }

    /// Apple configuration from the loaded settings, if any
    #[must_use]
    pub fn apple_config(&self) -> Option<AppleSignInConfig> {
        self.apple.as_ref().map(|a| AppleSignInConfig {
            service_id: a.service_id.clone().unwrap_or_default(),
            redirect_uri: a.redirect_uri.clone(),
        })
    }

    /// Microsoft configuration from the loaded settings, if any
    #[must_use]
    pub fn microsoft_config(&self) -> Option<MicrosoftSignInConfig> {
        self.microsoft.as_ref().map(|m| MicrosoftSignInConfig {
            client_id: m.client_id.clone().unwrap_or_default(),
            redirect_uri: m.redirect_uri.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean_env_vars() {
        std::env::remove_var("SIGNON_COMPLETION_TIMEOUT_SECS");
        std::env::remove_var("SIGNON_POLL_INTERVAL_MS");
        std::env::remove_var("GOOGLE_WEB_CLIENT_ID");
        std::env::remove_var("GOOGLE_IOS_CLIENT_ID");
        std::env::remove_var("GOOGLE_REDIRECT_URI");
        std::env::remove_var("APPLE_SERVICE_ID");
        std::env::remove_var("APPLE_REDIRECT_URI");
        std::env::remove_var("MICROSOFT_CLIENT_ID");
        std::env::remove_var("MICROSOFT_REDIRECT_URI");
        std::env::remove_var("SIGNON_SECRETS_DIR");
    }

    #[test]
    fn test_bridge_defaults() {
        let settings = SignonSettings::default();
        assert_eq!(settings.bridge.completion_timeout_secs, 300);
        assert_eq!(settings.bridge.poll_interval_ms, 200);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.google.is_none());
    }

    #[test]
    #[serial]
    fn test_bridge_env_overrides() {
        clean_env_vars();

        let mut settings = SignonSettings::default();
        std::env::set_var("SIGNON_COMPLETION_TIMEOUT_SECS", "60");
        std::env::set_var("SIGNON_POLL_INTERVAL_MS", "500");

        SignonSettings::apply_env_overrides(&mut settings);
        assert_eq!(settings.bridge.completion_timeout_secs, 60);
        assert_eq!(settings.bridge.poll_interval_ms, 500);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_provider_env_overrides_create_sections() {
        clean_env_vars();

        let mut settings = SignonSettings::default();
        std::env::set_var("GOOGLE_WEB_CLIENT_ID", "abc");
        std::env::set_var("GOOGLE_REDIRECT_URI", "http://127.0.0.1:0/google-callback");
        std::env::set_var("MICROSOFT_CLIENT_ID", "ms-client");

        SignonSettings::apply_env_overrides(&mut settings);

        let google = settings.google_config().unwrap();
        assert_eq!(google.web_client_id.as_deref(), Some("abc"));
        assert_eq!(
            google.redirect_uri.as_deref(),
            Some("http://127.0.0.1:0/google-callback")
        );

        let microsoft = settings.microsoft_config().unwrap();
        assert_eq!(microsoft.client_id, "ms-client");

        assert!(settings.apple_config().is_none());

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_numeric_override_is_ignored() {
        clean_env_vars();

        let mut settings = SignonSettings::default();
        std::env::set_var("SIGNON_COMPLETION_TIMEOUT_SECS", "not-a-number");

        SignonSettings::apply_env_overrides(&mut settings);
        assert_eq!(settings.bridge.completion_timeout_secs, 300);

        clean_env_vars();
    }

    #[test]
    fn test_toml_round_trip() {
        let toml = r#"
[bridge]
completion_timeout_secs = 120
poll_interval_ms = 100

[logging]
level = "debug"

[google]
web_client_id = "abc"
redirect_uri = "http://127.0.0.1:0/google-callback"

[apple]
service_id = "com.example.service"
redirect_uri = "http://127.0.0.1:0/apple-callback"
"#;

        let settings: SignonSettings = basic_toml::from_str(toml).unwrap();
        assert_eq!(settings.bridge.completion_timeout_secs, 120);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(
            settings.apple_config().unwrap().service_id,
            "com.example.service"
        );
        assert!(settings.microsoft_config().is_none());
    }
}

// Settings loading: TOML files, secrets-dir override and environment
// variables layered in the documented priority order.

use serial_test::serial;
use signon::testing::test_settings;
use signon::SignonSettings;

fn clean_env_vars() {
    std::env::remove_var("SIGNON_SECRETS_DIR");
    std::env::remove_var("SIGNON_COMPLETION_TIMEOUT_SECS");
    std::env::remove_var("SIGNON_POLL_INTERVAL_MS");
    std::env::remove_var("GOOGLE_WEB_CLIENT_ID");
    std::env::remove_var("GOOGLE_REDIRECT_URI");
    std::env::remove_var("APPLE_SERVICE_ID");
    std::env::remove_var("APPLE_REDIRECT_URI");
    std::env::remove_var("MICROSOFT_CLIENT_ID");
    std::env::remove_var("MICROSOFT_REDIRECT_URI");
}

#[test]
#[serial]
fn test_load_from_secrets_dir() {
    clean_env_vars();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Settings.toml"),
        r#"
[bridge]
completion_timeout_secs = 42
poll_interval_ms = 100

[logging]
level = "debug"

[google]
web_client_id = "from-secrets"
redirect_uri = "http://127.0.0.1:0/google-callback"
"#,
    )
    .unwrap();
    std::env::set_var("SIGNON_SECRETS_DIR", dir.path());

    let settings = SignonSettings::load().unwrap();
    assert_eq!(settings.bridge.completion_timeout_secs, 42);
    assert_eq!(
        settings.google_config().unwrap().web_client_id.as_deref(),
        Some("from-secrets")
    );

    clean_env_vars();
}

#[test]
#[serial]
fn test_env_overrides_beat_secrets_dir() {
    clean_env_vars();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Settings.toml"),
        r#"
[google]
web_client_id = "from-secrets"
"#,
    )
    .unwrap();
    std::env::set_var("SIGNON_SECRETS_DIR", dir.path());
    std::env::set_var("GOOGLE_WEB_CLIENT_ID", "from-env");
    std::env::set_var("SIGNON_COMPLETION_TIMEOUT_SECS", "7");

    let settings = SignonSettings::load().unwrap();
    assert_eq!(
        settings.google_config().unwrap().web_client_id.as_deref(),
        Some("from-env")
    );
    assert_eq!(settings.bridge.completion_timeout_secs, 7);

    clean_env_vars();
}

#[test]
#[serial]
fn test_defaults_without_any_configuration() {
    clean_env_vars();

    let settings = SignonSettings::load().unwrap();
    assert_eq!(settings.bridge.completion_timeout_secs, 300);
    assert_eq!(settings.bridge.poll_interval_ms, 200);
    assert!(settings.google_config().is_none());
    assert!(settings.apple_config().is_none());
    assert!(settings.microsoft_config().is_none());
}

#[test]
fn test_testing_fixture_settings_are_short_lived() {
    let settings = test_settings();
    assert!(settings.bridge.completion_timeout_secs <= 10);
}

// End-to-end launcher flows over the loopback redirect bridge.
// The popup is played by a fake opener that posts the redirect fragment to
// the relay endpoint exactly as the relay page would.

use serde_json::json;
use signon::bridge::{PopupFeatures, PopupOpener};
use signon::providers::google::GoogleSignInRequestScope;
use signon::providers::ProviderKind;
use signon::testing::mocks::auth_query_param;
use signon::testing::{
    apple_fragment, google_fragment, make_id_token, test_settings, CapturingOpener,
    RelayPopupOpener,
};
use signon::{
    Platform, SignInError, SignInLauncher, SignInResult, WebLauncher,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

fn configured_launcher(opener: Arc<dyn PopupOpener>) -> WebLauncher {
    let launcher = WebLauncher::with_opener(&test_settings(), opener);
    launcher
        .google()
        .configure(signon::providers::google::GoogleSignInConfig {
            web_client_id: Some("abc".to_string()),
            ios_client_id: None,
            redirect_uri: Some("http://127.0.0.1:0/google-callback".to_string()),
        });
    launcher
        .apple()
        .configure(signon::providers::apple::AppleSignInConfig {
            service_id: "com.example.service".to_string(),
            redirect_uri: Some("http://127.0.0.1:0/apple-callback".to_string()),
        });
    launcher
        .microsoft()
        .configure(signon::providers::microsoft::MicrosoftSignInConfig {
            client_id: "ms-client".to_string(),
            redirect_uri: Some("http://127.0.0.1:0/microsoft-callback".to_string()),
        });
    launcher
}

#[actix_web::test]
async fn test_google_popup_flow_normalizes_fragment() {
    let token = make_id_token(&json!({
        "sub": "google-sub",
        "email": "jane@example.com",
        "name": "Jane Doe",
    }));
    let opener = Arc::new(RelayPopupOpener::with_fragment(google_fragment(&token)));
    let launcher = configured_launcher(opener);

    let result = launcher
        .sign_in_with_google(&[GoogleSignInRequestScope::Email])
        .await
        .unwrap();

    assert_eq!(result.id_token, token);
    assert_eq!(result.user_id, Some("google-sub".to_string()));
    assert_eq!(result.email, Some("jane@example.com".to_string()));
    assert_eq!(result.full_name, Some("Jane Doe".to_string()));
    assert_eq!(result.platform, Platform::Web);
}

#[actix_web::test]
async fn test_apple_popup_flow_echoes_hashed_nonce() {
    // The relayed token embeds whatever nonce the authorize URL carried,
    // which is the hash of the pending raw nonce
    let opener = Arc::new(RelayPopupOpener::from_auth_url(|url: &Url| {
        let hashed_nonce = auth_query_param(url, "nonce").unwrap();
        let token = make_id_token(&json!({
            "sub": "apple-sub",
            "nonce": hashed_nonce,
        }));
        apple_fragment(&token, Some("auth-code-1"))
    }));
    let launcher = configured_launcher(opener);

    let result = launcher.sign_in_with_apple().await.unwrap();
    assert_eq!(result.user_id, Some("apple-sub".to_string()));
    assert_eq!(result.auth_code, Some("auth-code-1".to_string()));
    assert_eq!(result.platform, Platform::Web);
    // Apple only surfaces email and name on first consent
    assert_eq!(result.email, None);
    assert_eq!(result.full_name, None);
}

#[actix_web::test]
async fn test_apple_fragment_without_code_never_matches_markers() {
    // A fragment missing `code` is not a completed Apple handshake; the
    // listener ignores it and the short test timeout fires
    let token = make_id_token(&json!({"sub": "apple-sub"}));
    let fragment = apple_fragment(&token, None);

    let mut settings = test_settings();
    settings.bridge.completion_timeout_secs = 1;
    let launcher = WebLauncher::with_opener(
        &settings,
        Arc::new(RelayPopupOpener::with_fragment(fragment)),
    );
    launcher
        .apple()
        .configure(signon::providers::apple::AppleSignInConfig {
            service_id: "com.example.service".to_string(),
            redirect_uri: Some("http://127.0.0.1:0/apple-callback".to_string()),
        });

    let err = launcher.sign_in_with_apple().await.unwrap_err();
    assert!(matches!(err, SignInError::Timeout(1)));
}

#[actix_web::test]
async fn test_apple_nonce_mismatch_is_rejected() {
    let token = make_id_token(&json!({
        "sub": "apple-sub",
        "nonce": "a-nonce-from-some-other-request",
    }));
    let opener = Arc::new(RelayPopupOpener::with_fragment(apple_fragment(
        &token,
        Some("code"),
    )));
    let launcher = configured_launcher(opener);

    let err = launcher.sign_in_with_apple().await.unwrap_err();
    assert!(matches!(err, SignInError::InvalidState(_)));
}

struct CountingRelay {
    inner: RelayPopupOpener,
    opens: AtomicUsize,
}

impl PopupOpener for CountingRelay {
    fn open(&self, url: &Url, features: &PopupFeatures) -> Result<(), SignInError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(url, features)
    }
}

#[actix_web::test]
async fn test_microsoft_interactive_then_silent_reuse() {
    let token = make_id_token(&json!({
        "tid": "tenant-9",
        "preferred_username": "jane@contoso.com",
        "email": "personal@example.com",
    }));
    let fragment = format!("#id_token={token}&access_token=ms-at&expires_in=3600");
    let opener = Arc::new(CountingRelay {
        inner: RelayPopupOpener::with_fragment(fragment),
        opens: AtomicUsize::new(0),
    });
    let launcher = configured_launcher(Arc::clone(&opener) as Arc<dyn PopupOpener>);

    // First launch: no session, silent acquisition falls back to the popup
    let first = launcher.sign_in_with_microsoft().await.unwrap();
    assert_eq!(first.tenant_id, Some("tenant-9".to_string()));
    assert_eq!(first.email, Some("jane@contoso.com".to_string()));
    assert_eq!(first.access_token, Some("ms-at".to_string()));
    assert_eq!(opener.opens.load(Ordering::SeqCst), 1);

    // Second launch: the create-once client serves the cached session
    // silently, no second popup
    let second = launcher.sign_in_with_microsoft().await.unwrap();
    assert_eq!(second.access_token, Some("ms-at".to_string()));
    assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
}

struct BlockedOpener;

impl PopupOpener for BlockedOpener {
    fn open(&self, _url: &Url, _features: &PopupFeatures) -> Result<(), SignInError> {
        Err(SignInError::PopupBlocked)
    }
}

#[actix_web::test]
async fn test_blocked_popup_fails_launch() {
    let launcher = configured_launcher(Arc::new(BlockedOpener));

    let err = launcher.sign_in_with_google(&[]).await.unwrap_err();
    assert!(matches!(err, SignInError::PopupBlocked));
}

#[actix_web::test]
async fn test_popup_closed_without_completing_times_out() {
    let mut settings = test_settings();
    settings.bridge.completion_timeout_secs = 1;
    let launcher = WebLauncher::with_opener(&settings, Arc::new(CapturingOpener::new()));
    launcher
        .google()
        .configure(signon::providers::google::GoogleSignInConfig {
            web_client_id: Some("abc".to_string()),
            ios_client_id: None,
            redirect_uri: Some("http://127.0.0.1:0/google-callback".to_string()),
        });

    let err = launcher.sign_in_with_google(&[]).await.unwrap_err();
    assert!(matches!(err, SignInError::Timeout(1)));
}

#[actix_web::test]
async fn test_capability_interface_tags_results_by_provider() {
    let token = make_id_token(&json!({"sub": "google-sub"}));
    let opener = Arc::new(RelayPopupOpener::with_fragment(google_fragment(&token)));
    let launcher = configured_launcher(opener);

    let result = launcher.launch(ProviderKind::Google).await.unwrap();
    assert_eq!(result.platform(), Platform::Web);
    match result {
        SignInResult::Google(google) => {
            assert_eq!(google.user_id, Some("google-sub".to_string()));
        }
        other => panic!("expected a Google result, got {other:?}"),
    }
}

#[actix_web::test]
async fn test_authorize_url_reflects_ephemeral_relay_port() {
    let opener = Arc::new(CapturingOpener::new());
    let mut settings = test_settings();
    settings.bridge.completion_timeout_secs = 1;
    let launcher = WebLauncher::with_opener(&settings, Arc::clone(&opener) as Arc<dyn PopupOpener>);
    launcher
        .google()
        .configure(signon::providers::google::GoogleSignInConfig {
            web_client_id: Some("abc".to_string()),
            ios_client_id: None,
            redirect_uri: Some("http://127.0.0.1:0/google-callback".to_string()),
        });

    let _ = launcher.sign_in_with_google(&[]).await;

    let captured = opener.captured();
    assert_eq!(captured.len(), 1);
    let redirect = auth_query_param(&captured[0], "redirect_uri").unwrap();
    let redirect = Url::parse(&redirect).unwrap();
    // Port 0 in the configured redirect URI was replaced by the bound port
    assert_ne!(redirect.port(), Some(0));
    assert_eq!(redirect.path(), "/google-callback");
}

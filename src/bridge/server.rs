//! Loopback relay server
//!
//! Binds the opener side of the bridge to the loopback interface. The server
//! serves the relay page at the provider callback path the browser is
//! redirected to, and accepts the relayed fragment on `POST /relay`. Nothing
//! here ever sees a token over the network: the provider returns it in the
//! URL fragment, the relay page forwards it over the loopback interface, and
//! the server hands it straight to the in-process listener.

use crate::bridge::listener::FragmentListener;
use crate::bridge::popup::relay_page;
use crate::bridge::CALLBACK_MARKERS;
use crate::error::SignInError;
use crate::settings::BridgeSettings;
use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use log::{debug, info};
use tokio::sync::mpsc;
use url::Url;

/// Shared state of the relay endpoints
#[derive(Clone)]
pub(crate) struct BridgeState {
    relay: mpsc::UnboundedSender<String>,
    poll_interval_ms: u64,
}

/// A running loopback relay bound for one sign-in attempt
pub struct RedirectBridge {
    redirect_uri: Url,
    handle: ServerHandle,
}

impl RedirectBridge {
    /// Bind the relay server for the given redirect URI and hand back the
    /// one-shot fragment listener
    ///
    /// The redirect URI must be an `http` URL on the loopback interface; a
    /// port of `0` binds an ephemeral port, reflected in
    /// [`RedirectBridge::redirect_uri`].
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::Configuration`] for a redirect URI that does
    /// not point at the loopback interface, or [`SignInError::Provider`]
    /// when binding fails.
    pub fn start(
        redirect_uri: &Url,
        settings: &BridgeSettings,
    ) -> Result<(Self, FragmentListener), SignInError> {
        if redirect_uri.scheme() != "http" {
            return Err(SignInError::Configuration(format!(
                "redirect URI {redirect_uri} must use http on the loopback interface"
            )));
        }
        let host = redirect_uri.host_str().unwrap_or_default().to_string();
        if host != "127.0.0.1" && host != "localhost" {
            return Err(SignInError::Configuration(format!(
                "redirect URI host {host} is not a loopback interface"
            )));
        }
        let port = redirect_uri.port().unwrap_or(80);

        let (tx, rx) = mpsc::unbounded_channel();
        let state = BridgeState {
            relay: tx,
            poll_interval_ms: settings.poll_interval_ms,
        };

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/relay", web::post().to(relay_fragment))
                .route("/{path:.*}", web::get().to(serve_relay_page))
        })
        .workers(1)
        .disable_signals()
        .bind((host.as_str(), port))
        .map_err(|e| {
            SignInError::Provider(format!("failed to bind loopback relay at {host}:{port}: {e}"))
        })?;

        // With port 0 the effective port is only known after binding
        let bound_port = server
            .addrs()
            .first()
            .map_or(port, std::net::SocketAddr::port);
        let mut effective = redirect_uri.clone();
        let _ = effective.set_port(Some(bound_port));

        let server = server.run();
        let handle = server.handle();
        tokio::spawn(server);

        info!("loopback relay listening at {effective}");
        let listener = FragmentListener::new(rx, settings.completion_timeout_secs);
        Ok((
            Self {
                redirect_uri: effective,
                handle,
            },
            listener,
        ))
    }

    /// The redirect URI with the actually bound port filled in
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Stop accepting relayed fragments and shut the server down
    pub async fn shutdown(self) {
        self.handle.stop(false).await;
    }
}

/// Serve the relay page at any known provider callback path
async fn serve_relay_page(req: HttpRequest, state: web::Data<BridgeState>) -> HttpResponse {
    let path = req.path();
    if CALLBACK_MARKERS.iter().any(|marker| path.contains(marker)) {
        debug!("serving relay page for callback path {path}");
        HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(relay_page(state.poll_interval_ms))
    } else {
        HttpResponse::NotFound().finish()
    }
}

/// Accept the raw fragment relayed by the popup page
async fn relay_fragment(body: String, state: web::Data<BridgeState>) -> HttpResponse {
    if body.is_empty() {
        return HttpResponse::BadRequest().finish();
    }

    // A closed channel means the listener already accepted a fragment or the
    // launch was abandoned; either way the message is dropped
    if state.relay.send(body).is_err() {
        debug!("dropping relayed fragment: no listener attached");
    }
    HttpResponse::NoContent().finish()
}

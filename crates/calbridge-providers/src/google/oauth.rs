//! Implicit-grant token requests through a loopback redirect.
//!
//! # Flow Overview
//!
//! 1. Bind a listener on `127.0.0.1` in the configured port range
//! 2. Open the browser on the consent URL with `response_type=token`
//! 3. The provider redirects to `/callback` with the token in the URL fragment
//! 4. `/callback` serves a relay page that forwards the fragment to `/token`
//! 5. `/token` is parsed into a [`TokenResponse`] and the state is checked
//!
//! The listener gives up when the consent timeout elapses or the request
//! future is dropped.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::BoxFuture;
use crate::error::{ProviderError, ProviderResult};

use super::config::SessionConfig;
use super::identity::IdentityClient;

/// How often the listener checks for a new connection.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Read timeout for a single browser request.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

const RELAY_PAGE: &str = "<!DOCTYPE html><html><head><title>calbridge</title></head><body>\
<p id=\"status\">Completing sign-in...</p>\
<script>\
var fragment = window.location.hash.substring(1);\
var query = fragment || window.location.search.substring(1);\
fetch('/token?' + query).then(function () {\
document.getElementById('status').textContent = 'You can close this window and return to the terminal.';\
});\
</script></body></html>";

const DONE_PAGE: &str = "<html><body><h1>Authorization received</h1>\
<p>You can close this window.</p></body></html>";

/// What to ask the provider for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// OAuth client identifier.
    pub client_id: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
}

/// The provider's answer, as carried in the redirect fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    /// The bearer token on success.
    pub access_token: Option<String>,
    /// Token lifetime in seconds.
    pub expires_in: Option<u64>,
    /// Space-separated granted scopes.
    pub scope: Option<String>,
    /// Usually `Bearer`.
    pub token_type: Option<String>,
    /// Error code on failure, e.g. `access_denied`.
    pub error: Option<String>,
    /// Human-readable error detail.
    pub error_description: Option<String>,
    /// Echo of the request state.
    pub state: Option<String>,
}

impl TokenResponse {
    /// Parses a `key=value&...` string as sent in the redirect.
    pub fn from_query(query: &str) -> Self {
        let mut response = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "access_token" => response.access_token = Some(value),
                "expires_in" => response.expires_in = value.parse().ok(),
                "scope" => response.scope = Some(value),
                "token_type" => response.token_type = Some(value),
                "error" => response.error = Some(value),
                "error_description" => response.error_description = Some(value),
                "state" => response.state = Some(value),
                _ => {}
            }
        }
        response
    }

    /// Returns the access token, or an authentication error if the provider
    /// reported one or sent no token.
    pub fn into_access_token(self) -> ProviderResult<String> {
        if let Some(error) = self.error {
            let detail = self
                .error_description
                .map(|d| format!(" ({})", d))
                .unwrap_or_default();
            return Err(ProviderError::authentication(format!(
                "authorization denied: {}{}",
                error, detail
            )));
        }
        match self.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ProviderError::authentication(
                "no access token in authorization response",
            )),
        }
    }
}

/// Obtains a token from the provider as one future.
pub trait TokenRequester: Send + Sync {
    /// Runs the consent flow and resolves with the provider's response.
    fn request_token<'a>(
        &'a self,
        client: &'a IdentityClient,
        request: &'a TokenRequest,
    ) -> BoxFuture<'a, ProviderResult<TokenResponse>>;
}

type BrowserLauncher = Arc<dyn Fn(&str) -> io::Result<()> + Send + Sync>;

/// [`TokenRequester`] that sends the browser to the consent page and waits
/// on a loopback listener.
#[derive(Clone)]
pub struct LoopbackTokenRequester {
    port_range: (u16, u16),
    consent_timeout: Duration,
    launcher: BrowserLauncher,
}

impl std::fmt::Debug for LoopbackTokenRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTokenRequester")
            .field("port_range", &self.port_range)
            .field("consent_timeout", &self.consent_timeout)
            .finish_non_exhaustive()
    }
}

impl LoopbackTokenRequester {
    /// Creates a requester using the given port range and timeout.
    pub fn new(port_range: (u16, u16), consent_timeout: Duration) -> Self {
        Self {
            port_range,
            consent_timeout,
            launcher: Arc::new(|url: &str| open::that(url)),
        }
    }

    /// Creates a requester from the session configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.loopback_port_range, config.consent_timeout)
    }

    /// Replaces how the consent URL is opened.
    pub fn with_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&str) -> io::Result<()> + Send + Sync + 'static,
    {
        self.launcher = Arc::new(launcher);
        self
    }

    async fn run(
        &self,
        client: &IdentityClient,
        request: &TokenRequest,
    ) -> ProviderResult<TokenResponse> {
        let (listener, port) = bind_loopback_server(self.port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);
        let state = generate_state();

        let auth_url =
            client.authorization_url(&request.client_id, &request.scopes, &redirect_uri, &state)?;

        info!("starting sign-in, opening browser...");
        debug!("redirect URI: {}", redirect_uri);

        if let Err(e) = (self.launcher)(auth_url.as_str()) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancelled));
        let deadline = Instant::now() + self.consent_timeout;

        let response = tokio::task::spawn_blocking(move || {
            wait_for_token(listener, deadline, &cancelled)
        })
        .await
        .map_err(|e| {
            ProviderError::authentication(format!("sign-in listener failed: {}", e))
                .with_source(e)
        })??;

        if response.state.as_deref() != Some(state.as_str()) {
            return Err(ProviderError::authentication(
                "authorization state mismatch",
            ));
        }

        Ok(response)
    }
}

impl TokenRequester for LoopbackTokenRequester {
    fn request_token<'a>(
        &'a self,
        client: &'a IdentityClient,
        request: &'a TokenRequest,
    ) -> BoxFuture<'a, ProviderResult<TokenResponse>> {
        Box::pin(self.run(client, request))
    }
}

/// Stops the listener thread when the request future goes away.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Generates a random state string for CSRF protection.
fn generate_state() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..16).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Tries to bind a TCP listener on an available port in the given range.
fn bind_loopback_server(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            let port = listener
                .local_addr()
                .map(|addr| addr.port())
                .unwrap_or(port);
            debug!("bound loopback server on port {}", port);
            return Ok((listener, port));
        }
    }
    Err(ProviderError::configuration(format!(
        "no available port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Accepts connections until a token response arrives, the deadline passes
/// or `cancelled` is set.
fn wait_for_token(
    listener: TcpListener,
    deadline: Instant,
    cancelled: &AtomicBool,
) -> ProviderResult<TokenResponse> {
    listener.set_nonblocking(true).map_err(|e| {
        ProviderError::authentication(format!("failed to configure listener: {}", e))
            .with_source(e)
    })?;

    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(ProviderError::authentication("sign-in cancelled"));
        }
        if Instant::now() >= deadline {
            return Err(ProviderError::authentication(
                "timed out waiting for authorization",
            ));
        }

        match listener.accept() {
            Ok((stream, _)) => {
                if let Some(response) = handle_connection(stream) {
                    return Ok(response);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                warn!("failed to accept connection: {}", e);
            }
        }
    }
}

/// Serves one browser request. Returns the token response once `/token`
/// (or a `/callback` carrying an error in its query) is hit.
fn handle_connection(mut stream: TcpStream) -> Option<TokenResponse> {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(REQUEST_READ_TIMEOUT));

    let mut request_line = String::new();
    {
        let mut reader = BufReader::new(&stream);
        if reader.read_line(&mut request_line).is_err() {
            return None;
        }
        // Drain headers so closing the socket does not reset the connection.
        let mut header = String::new();
        while reader.read_line(&mut header).is_ok_and(|n| n > 2) {
            header.clear();
        }
    }

    // GET /token?access_token=...&state=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        respond(&mut stream, "405 Method Not Allowed", "");
        return None;
    };

    let (route, query) = target.split_once('?').unwrap_or((target, ""));
    match route {
        "/callback" => {
            let response = TokenResponse::from_query(query);
            if response.error.is_some() {
                respond(&mut stream, "200 OK", DONE_PAGE);
                return Some(response);
            }
            respond(&mut stream, "200 OK", RELAY_PAGE);
            None
        }
        "/token" => {
            respond(&mut stream, "200 OK", DONE_PAGE);
            Some(TokenResponse::from_query(query))
        }
        _ => {
            respond(&mut stream, "404 Not Found", "");
            None
        }
    }
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

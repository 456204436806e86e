//! OAuth 2.0 installed-application flow with a loopback redirect.
//!
//! # Flow Overview
//!
//! 1. Read the client secrets file
//! 2. Bind a local HTTP listener on an OS-assigned port
//! 3. Generate a PKCE code verifier, its SHA-256 challenge and a CSRF state
//! 4. Open the user's browser on the consent page
//! 5. Wait for the provider to redirect back to the listener
//! 6. Exchange the authorization code (with the verifier) for tokens
//!
//! `access_type=offline` and `prompt=consent` are always requested so that
//! Google issues a refresh token even when the user consented before.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gcal_token_core::CredentialRecord;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::{OAuthError, OAuthResult};
use crate::flow::{AuthorizationFlow, BoxFuture};
use crate::secrets::ClientSecrets;

/// Host the loopback listener binds to.
const LOOPBACK_HOST: &str = "127.0.0.1";

/// How long a loopback connection may stay silent before it is dropped.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// The CSRF state length (in bytes, before base64 encoding).
const STATE_LENGTH: usize = 16;

/// Settings for [`InstalledFlow`].
#[derive(Debug, Clone)]
pub struct InstalledFlowConfig {
    /// Timeout for requests to the token endpoint.
    pub request_timeout: Duration,
    /// How long to wait for the browser to redirect back.
    pub callback_timeout: Duration,
    /// Whether to try opening the consent page in a browser.
    pub open_browser: bool,
}

impl InstalledFlowConfig {
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default callback timeout in seconds.
    pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets whether the browser is opened automatically.
    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }
}

impl Default for InstalledFlowConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            callback_timeout: Duration::from_secs(Self::DEFAULT_CALLBACK_TIMEOUT_SECS),
            open_browser: true,
        }
    }
}

/// The installed-application authorization flow.
#[derive(Debug)]
pub struct InstalledFlow {
    config: InstalledFlowConfig,
    http_client: reqwest::Client,
}

impl InstalledFlow {
    /// Creates a new flow.
    pub fn new(config: InstalledFlowConfig) -> OAuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("gcal-token/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OAuthError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn run(&self, credentials_path: &Path, scopes: &[String]) -> OAuthResult<CredentialRecord> {
        let secrets = ClientSecrets::from_file(credentials_path)?;
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback()?;
        let redirect_uri = format!("http://{}:{}/", LOOPBACK_HOST, port);

        let auth_url = pkce.build_auth_url(
            &secrets.auth_uri,
            &secrets.client_id,
            &redirect_uri,
            scopes,
        );
        debug!("authorization URL: {}", auth_url);

        self.present_auth_url(&auth_url);

        let callback_timeout = self.config.callback_timeout;
        let (code, received_state) =
            tokio::task::spawn_blocking(move || wait_for_callback(listener, callback_timeout))
                .await
                .map_err(|e| OAuthError::internal("callback listener panicked").with_source(e))??;

        self.finish(secrets, &pkce, &code, &received_state, &redirect_uri, scopes)
            .await
    }

    /// Checks the redirect's state, exchanges the code and builds the record.
    async fn finish(
        &self,
        secrets: ClientSecrets,
        pkce: &PkceFlow,
        code: &str,
        received_state: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> OAuthResult<CredentialRecord> {
        if received_state != pkce.state {
            return Err(OAuthError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens...");

        let response = self
            .exchange_code(&secrets, code, &pkce.verifier, redirect_uri)
            .await?;

        let refresh_token = response.refresh_token.ok_or_else(|| {
            OAuthError::authentication(
                "token response did not include a refresh token; \
                 revoke the app's access in your Google account and retry",
            )
        })?;

        if let Some(granted) = response.scope.as_deref() {
            let granted: Vec<&str> = granted.split_whitespace().collect();
            if !scopes.iter().all(|s| granted.contains(&s.as_str())) {
                warn!("granted scopes {:?} differ from requested {:?}", granted, scopes);
            }
        }

        info!("successfully obtained tokens");
        Ok(CredentialRecord::new(
            response.access_token,
            refresh_token,
            secrets.token_uri,
            secrets.client_id,
            secrets.client_secret,
            scopes.to_vec(),
        ))
    }

    fn present_auth_url(&self, auth_url: &str) {
        eprint!("{}", auth_url_prompt(auth_url));
        if self.config.open_browser {
            info!("opening browser for consent...");
            if let Err(e) = open::that(auth_url) {
                warn!("failed to open browser: {}", e);
            }
        }
    }

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        secrets: &ClientSecrets,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> OAuthResult<TokenResponse> {
        let params = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        self.post_token_request(&secrets.token_uri, &params, "token exchange")
            .await
    }

    async fn refresh(&self, record: &CredentialRecord) -> OAuthResult<()> {
        let params = [
            ("client_id", record.client_id.as_str()),
            ("client_secret", record.client_secret.as_str()),
            ("refresh_token", record.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .post_token_request(&record.token_uri, &params, "token refresh")
            .await?;

        debug!(
            "refresh returned access token expiring in {:?}s",
            response.expires_in
        );
        info!("refresh token accepted by {}", record.token_uri);
        Ok(())
    }

    async fn post_token_request(
        &self,
        token_uri: &str,
        params: &[(&str, &str)],
        what: &str,
    ) -> OAuthResult<TokenResponse> {
        let response = self
            .http_client
            .post(token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                OAuthError::network(format!("{} request failed: {}", what, e)).with_source(e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OAuthError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(OAuthError::authentication(format!(
                "{} failed ({}): {}",
                what, status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            OAuthError::invalid_response(format!("invalid token response: {}", e))
        })
    }
}

impl AuthorizationFlow for InstalledFlow {
    fn authorize<'a>(
        &'a self,
        credentials_path: &'a Path,
        scopes: &'a [String],
    ) -> BoxFuture<'a, OAuthResult<CredentialRecord>> {
        Box::pin(self.run(credentials_path, scopes))
    }

    fn verify_refresh_token<'a>(
        &'a self,
        record: &'a CredentialRecord,
    ) -> BoxFuture<'a, OAuthResult<()>> {
        Box::pin(self.refresh(record))
    }
}

/// The message that tells the user where to consent.
fn auth_url_prompt(auth_url: &str) -> String {
    format!(
        "\nPlease visit this URL to authorize this application:\n\n{}\n\n",
        auth_url
    )
}

/// Binds the loopback listener on a port chosen by the OS.
fn bind_loopback() -> OAuthResult<(TcpListener, u16)> {
    let listener = TcpListener::bind((LOOPBACK_HOST, 0)).map_err(|e| {
        OAuthError::configuration("failed to bind loopback listener").with_source(e)
    })?;
    let port = listener
        .local_addr()
        .map_err(|e| OAuthError::internal("failed to read listener address").with_source(e))?
        .port();
    debug!("bound loopback server on port {}", port);
    Ok((listener, port))
}

/// Waits for the OAuth redirect and returns the code and state.
fn wait_for_callback(listener: TcpListener, timeout: Duration) -> OAuthResult<(String, String)> {
    listener
        .set_nonblocking(false)
        .map_err(|e| OAuthError::internal("failed to set blocking").with_source(e))?;

    let (tx, rx) = mpsc::channel();

    // The accept loop cannot be interrupted, so it runs on its own thread
    let _handle = thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = handle_connection(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(OAuthError::authentication("OAuth callback timeout"))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(OAuthError::internal("callback channel disconnected"))
        }
    }
}

/// Handles one request on the loopback listener.
///
/// Returns `None` for requests unrelated to the redirect (e.g. favicon).
fn handle_connection(mut stream: TcpStream) -> Option<OAuthResult<(String, String)>> {
    // Browsers open idle preconnect sockets; don't let one stall the accept loop
    if stream.set_read_timeout(Some(REQUEST_READ_TIMEOUT)).is_err() {
        return None;
    }

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();

    if reader.read_line(&mut request_line).is_err() {
        return None;
    }

    let callback = parse_callback(&request_line);

    let response = match callback {
        Callback::Ignored => {
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        }
        Callback::Authorized { .. } => {
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
            <html><body><h1>Authorization Successful</h1>\
            <p>You can close this window and return to the terminal.</p></body></html>"
        }
        Callback::Denied(_) | Callback::MissingCode => {
            "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
            <html><body><h1>Authorization Failed</h1>\
            <p>You can close this window.</p></body></html>"
        }
    };

    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    match callback {
        Callback::Ignored => None,
        Callback::Authorized { code, state } => Some(Ok((code, state))),
        Callback::Denied(error) => Some(Err(OAuthError::authentication(format!(
            "authorization denied: {}",
            error
        )))),
        Callback::MissingCode => Some(Err(OAuthError::authentication(
            "missing authorization code in callback",
        ))),
    }
}

/// What a request on the loopback listener carried.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Authorized { code: String, state: String },
    Denied(String),
    MissingCode,
    Ignored,
}

/// Parses an HTTP request line such as `GET /?code=...&state=... HTTP/1.1`.
fn parse_callback(request_line: &str) -> Callback {
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 || parts[0] != "GET" {
        return Callback::Ignored;
    }

    let Ok(url) = url::Url::parse(&format!("http://{}{}", LOOPBACK_HOST, parts[1])) else {
        return Callback::Ignored;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Callback::Denied(error);
    }

    match (code, state) {
        (Some(code), state) => Callback::Authorized {
            code,
            state: state.unwrap_or_default(),
        },
        (None, Some(_)) => Callback::MissingCode,
        (None, None) => Callback::Ignored,
    }
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        let state = random_token(STATE_LENGTH);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    /// Computes the SHA-256 challenge for a code verifier.
    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Builds the authorization URL for the consent page.
    pub fn build_auth_url(
        &self,
        auth_uri: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_uri,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from the token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OAuthErrorCode;
    use crate::secrets::GOOGLE_AUTH_URI;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

    #[test]
    fn pkce_verifier_length() {
        let flow = PkceFlow::new();
        // Base64 encoding of 32 bytes = 43 characters (no padding)
        assert_eq!(flow.verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_matches_rfc_example() {
        // RFC 7636 appendix B
        let challenge = PkceFlow::compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn pkce_state_is_random() {
        let flow1 = PkceFlow::new();
        let flow2 = PkceFlow::new();
        assert_ne!(flow1.state, flow2.state);
        assert_ne!(flow1.verifier, flow2.verifier);
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            GOOGLE_AUTH_URI,
            "test-client.apps.googleusercontent.com",
            "http://127.0.0.1:8080/",
            &[SCOPE.to_string()],
        );

        assert!(url.starts_with(GOOGLE_AUTH_URI));
        assert!(url.contains("client_id=test-client.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2F"));
        assert!(url.contains(
            "scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fcalendar.readonly"
        ));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={}", flow.state)));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn parse_callback_with_code_and_state() {
        let callback = parse_callback("GET /?state=xyz&code=4%2F0Abc&scope=a+b HTTP/1.1\r\n");
        assert_eq!(
            callback,
            Callback::Authorized {
                code: "4/0Abc".to_string(),
                state: "xyz".to_string(),
            }
        );
    }

    #[test]
    fn parse_callback_with_error() {
        let callback = parse_callback("GET /?error=access_denied&state=xyz HTTP/1.1\r\n");
        assert_eq!(callback, Callback::Denied("access_denied".to_string()));
    }

    #[test]
    fn parse_callback_ignores_unrelated_requests() {
        assert_eq!(
            parse_callback("GET /favicon.ico HTTP/1.1\r\n"),
            Callback::Ignored
        );
        assert_eq!(parse_callback("POST /?code=abc HTTP/1.1\r\n"), Callback::Ignored);
        assert_eq!(parse_callback(""), Callback::Ignored);
    }

    #[test]
    fn parse_callback_state_without_code() {
        assert_eq!(
            parse_callback("GET /?state=xyz HTTP/1.1\r\n"),
            Callback::MissingCode
        );
    }

    #[test]
    fn bind_loopback_uses_ephemeral_port() {
        let (_listener, port) = bind_loopback().unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn wait_for_callback_skips_favicon_and_returns_code() {
        let (listener, port) = bind_loopback().unwrap();

        let client = thread::spawn(move || {
            for line in [
                "GET /favicon.ico HTTP/1.1\r\n\r\n",
                "GET /?code=abc&state=xyz HTTP/1.1\r\n\r\n",
            ] {
                let mut stream = TcpStream::connect((LOOPBACK_HOST, port)).unwrap();
                stream.write_all(line.as_bytes()).unwrap();
                let mut response = String::new();
                let _ = std::io::Read::read_to_string(&mut stream, &mut response);
            }
        });

        let (code, state) = wait_for_callback(listener, Duration::from_secs(10)).unwrap();
        client.join().unwrap();
        assert_eq!(code, "abc");
        assert_eq!(state, "xyz");
    }

    #[test]
    fn wait_for_callback_survives_idle_connection() {
        let (listener, port) = bind_loopback().unwrap();

        let client = thread::spawn(move || {
            // Connects first and never sends a request line
            let idle = TcpStream::connect((LOOPBACK_HOST, port)).unwrap();
            let mut stream = TcpStream::connect((LOOPBACK_HOST, port)).unwrap();
            stream
                .write_all(b"GET /?code=abc&state=xyz HTTP/1.1\r\n\r\n")
                .unwrap();
            let mut response = String::new();
            let _ = std::io::Read::read_to_string(&mut stream, &mut response);
            drop(idle);
            response
        });

        let (code, state) = wait_for_callback(listener, REQUEST_READ_TIMEOUT * 3).unwrap();
        let response = client.join().unwrap();
        assert_eq!(code, "abc");
        assert_eq!(state, "xyz");
        assert!(response.starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn wait_for_callback_reports_denial() {
        let (listener, port) = bind_loopback().unwrap();

        thread::spawn(move || {
            let mut stream = TcpStream::connect((LOOPBACK_HOST, port)).unwrap();
            stream
                .write_all(b"GET /?error=access_denied HTTP/1.1\r\n\r\n")
                .unwrap();
        });

        let err = wait_for_callback(listener, Duration::from_secs(10)).unwrap_err();
        assert_eq!(err.code(), OAuthErrorCode::AuthenticationFailed);
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn wait_for_callback_times_out() {
        let (listener, _port) = bind_loopback().unwrap();
        let err = wait_for_callback(listener, Duration::from_millis(50)).unwrap_err();
        assert!(err.message().contains("timeout"));
    }

    /// Serves one canned HTTP response and returns the request it received.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = tokio::net::TcpListener::bind((LOOPBACK_HOST, 0)).await.unwrap();
        let url = format!("http://{}/token", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    fn record_for(token_uri: &str) -> CredentialRecord {
        CredentialRecord::new("T", "R", token_uri, "ID", "S", vec![SCOPE.to_string()])
    }

    #[tokio::test]
    async fn verify_refresh_token_posts_refresh_grant() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"access_token": "fresh", "expires_in": 3599, "token_type": "Bearer"}"#,
        )
        .await;

        let flow = InstalledFlow::new(InstalledFlowConfig::default()).unwrap();
        flow.verify_refresh_token(&record_for(&url)).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /token"));
        assert!(request.contains("grant_type=refresh_token"));
        assert!(request.contains("refresh_token=R"));
        assert!(request.contains("client_id=ID"));
    }

    #[tokio::test]
    async fn verify_refresh_token_rejected() {
        let (url, server) = serve_once(
            "400 Bad Request",
            r#"{"error": "invalid_grant", "error_description": "Bad Request"}"#,
        )
        .await;

        let flow = InstalledFlow::new(InstalledFlowConfig::default()).unwrap();
        let err = flow.verify_refresh_token(&record_for(&url)).await.unwrap_err();
        server.await.unwrap();

        assert_eq!(err.code(), OAuthErrorCode::AuthenticationFailed);
        assert!(err.message().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn exchange_code_parses_token_response() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"access_token": "ya29.a0", "refresh_token": "1//0g", "expires_in": 3599, "scope": "https://www.googleapis.com/auth/calendar.readonly", "token_type": "Bearer"}"#,
        )
        .await;

        let secrets = secrets_for(url);
        let flow = InstalledFlow::new(InstalledFlowConfig::default()).unwrap();
        let response = flow
            .exchange_code(&secrets, "4/0Abc", "verifier", "http://127.0.0.1:1/")
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.contains("grant_type=authorization_code"));
        assert!(request.contains("code_verifier=verifier"));
        assert_eq!(response.access_token, "ya29.a0");
        assert_eq!(response.refresh_token.as_deref(), Some("1//0g"));
    }

    fn secrets_for(token_uri: String) -> ClientSecrets {
        ClientSecrets {
            client_id: "ID".to_string(),
            client_secret: "S".to_string(),
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri,
        }
    }

    #[tokio::test]
    async fn finish_builds_record_from_secrets_and_requested_scopes() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"access_token": "ya29.a0", "refresh_token": "1//0g", "expires_in": 3599, "scope": "https://www.googleapis.com/auth/calendar.readonly", "token_type": "Bearer"}"#,
        )
        .await;

        let pkce = PkceFlow::new();
        let scopes = vec![SCOPE.to_string()];
        let flow = InstalledFlow::new(InstalledFlowConfig::default()).unwrap();
        let record = flow
            .finish(
                secrets_for(url.clone()),
                &pkce,
                "4/0Abc",
                &pkce.state,
                "http://127.0.0.1:1/",
                &scopes,
            )
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.contains("code=4%2F0Abc"));
        assert!(request.contains(&format!("code_verifier={}", pkce.verifier)));
        assert_eq!(
            record,
            CredentialRecord::new("ya29.a0", "1//0g", url, "ID", "S", scopes)
        );
    }

    #[tokio::test]
    async fn finish_rejects_state_mismatch_without_exchanging() {
        // Nothing listens here; reaching the network would fail differently
        let secrets = secrets_for("http://127.0.0.1:1/token".to_string());
        let pkce = PkceFlow::new();
        let flow = InstalledFlow::new(InstalledFlowConfig::default()).unwrap();

        let err = flow
            .finish(
                secrets,
                &pkce,
                "4/0Abc",
                "forged-state",
                "http://127.0.0.1:1/",
                &[SCOPE.to_string()],
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), OAuthErrorCode::AuthenticationFailed);
        assert!(err.message().contains("state mismatch"));
    }

    #[tokio::test]
    async fn finish_requires_refresh_token() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"access_token": "ya29.a0", "expires_in": 3599, "token_type": "Bearer"}"#,
        )
        .await;

        let pkce = PkceFlow::new();
        let flow = InstalledFlow::new(InstalledFlowConfig::default()).unwrap();
        let err = flow
            .finish(
                secrets_for(url),
                &pkce,
                "4/0Abc",
                &pkce.state,
                "http://127.0.0.1:1/",
                &[SCOPE.to_string()],
            )
            .await
            .unwrap_err();
        server.await.unwrap();

        assert_eq!(err.code(), OAuthErrorCode::AuthenticationFailed);
        assert!(err.message().contains("refresh token"));
    }

    #[test]
    fn auth_url_prompt_shows_url_once() {
        let url = "https://accounts.google.com/o/oauth2/auth?state=abc";
        let prompt = auth_url_prompt(url);
        assert_eq!(prompt.matches(url).count(), 1);
        assert_eq!(prompt.matches("visit this URL").count(), 1);
    }

    #[tokio::test]
    async fn authorize_with_missing_secrets_file_fails_before_listening() {
        let tmp = tempfile::tempdir().unwrap();
        let flow = InstalledFlow::new(InstalledFlowConfig::default().with_open_browser(false))
            .unwrap();
        let err = flow
            .authorize(&tmp.path().join("credentials.json"), &[SCOPE.to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), OAuthErrorCode::ConfigurationError);
    }
}

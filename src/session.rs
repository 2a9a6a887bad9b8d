// File: ./src/session.rs
//! Session lifecycle: authorization-code + PKCE login, persistence and
//! restoration of the token/user pair, logout.
//!
//! The interactive browser step is abstracted behind the `AuthPrompt`
//! capability so the whole lifecycle is testable without a browser. The
//! state machine is:
//!
//! `LoggedOut -> (begin_login) -> Authorizing -> (code) -> Exchanging -> LoggedIn`
//!
//! with cancel/failure edges returning to `LoggedOut`. `auth_in_progress`
//! covers the Authorizing/Exchanging window; no concurrent attempts.
use crate::client::{ApiClient, TokenHandle};
use crate::config::Config;
use crate::context::AppContext;
use crate::pkce;
use crate::storage::TokenStore;
use crate::store::AppStore;
use http::Uri;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use url::Url;

/// Scopes requested from the authorization server.
const SCOPES: &str = "openid profile email offline_access";

/// Ephemeral per-attempt material. Lives only between the authorization
/// prompt and the code arrival; consumed by exactly one exchange.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub code_verifier: String,
    pub redirect_uri: String,
    pub expected_state: String,
}

/// Everything an interactive prompt needs to start the flow.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorize_url: String,
    pub redirect_uri: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPromptResult {
    Success { code: String, state: String },
    Cancelled,
    Failed(String),
}

/// Capability interface over the interactive authorization collaborator.
pub trait AuthPrompt: Send + Sync {
    fn begin_authorization(
        &self,
        request: &AuthorizationRequest,
    ) -> impl Future<Output = AuthPromptResult> + Send;

    fn end_session(&self, logout_url: &str) -> impl Future<Output = Result<(), String>> + Send;
}

pub struct SessionManager<P: AuthPrompt> {
    store: Arc<Mutex<AppStore>>,
    client: ApiClient,
    tokens: TokenHandle,
    prompt: P,
    ctx: Arc<dyn AppContext>,
    config: Config,
    pending: Mutex<Option<PendingAuthorization>>,
    /// Last authorization code handed to an exchange. A duplicate success
    /// event for the same code must not trigger a second exchange.
    last_processed_code: Mutex<Option<String>>,
}

impl<P: AuthPrompt> SessionManager<P> {
    pub fn new(
        store: Arc<Mutex<AppStore>>,
        client: ApiClient,
        tokens: TokenHandle,
        prompt: P,
        ctx: Arc<dyn AppContext>,
        config: Config,
    ) -> Self {
        Self {
            store,
            client,
            tokens,
            prompt,
            ctx,
            config,
            pending: Mutex::new(None),
            last_processed_code: Mutex::new(None),
        }
    }

    /// Restore a persisted session at process start. Storage trouble is
    /// logged and treated as "no stored session"; this never fails the
    /// process. Returns whether a session was installed.
    pub async fn restore(&self) -> bool {
        match TokenStore::load_session(self.ctx.as_ref()) {
            Some((token, user)) => {
                log::info!("Restored session for {}", user.email);
                self.tokens.set(Some(token.clone()));
                let mut store = self.store.lock().await;
                store.session.install(token, user);
                true
            }
            None => {
                log::info!("No stored session; starting logged out");
                false
            }
        }
    }

    /// Start an authorization attempt: marks the session as in progress,
    /// generates fresh PKCE material and returns the request to hand to the
    /// interactive prompt. A second call while one attempt is in flight is
    /// a logged no-op returning `None`.
    pub async fn begin_login(&self) -> Option<AuthorizationRequest> {
        let mut authorize_url = match Url::parse(&format!(
            "{}/authorize",
            self.config.issuer_url.trim_end_matches('/')
        )) {
            Ok(url) => url,
            Err(e) => {
                log::error!("Invalid issuer_url in config: {}", e);
                return None;
            }
        };

        {
            let mut store = self.store.lock().await;
            if store.session.auth_in_progress {
                log::warn!("Login already in progress; ignoring request");
                return None;
            }
            store.session.auth_in_progress = true;
        }

        let material = pkce::PkceMaterial::generate();
        let state = pkce::generate_state();
        let redirect_uri = self.config.redirect_uri.clone();

        authorize_url
            .query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("audience", &self.config.audience)
            .append_pair("state", &state)
            .append_pair("code_challenge", &material.challenge)
            .append_pair("code_challenge_method", "S256");

        let request = AuthorizationRequest {
            authorize_url: authorize_url.into(),
            redirect_uri: redirect_uri.clone(),
            state: state.clone(),
        };
        *self.pending.lock().await = Some(PendingAuthorization {
            code_verifier: material.verifier,
            redirect_uri,
            expected_state: state,
        });

        Some(request)
    }

    /// Handle the outcome of one interactive prompt. Returns `Ok(true)` when
    /// the session is authenticated afterwards, `Ok(false)` for a
    /// recoverable non-login (cancel, duplicate event, no attempt pending).
    pub async fn on_authorization_result(
        &self,
        result: AuthPromptResult,
    ) -> Result<bool, String> {
        match result {
            AuthPromptResult::Cancelled => {
                log::info!("Authorization cancelled by user");
                self.abandon().await;
                Ok(false)
            }
            AuthPromptResult::Failed(reason) => {
                self.abandon().await;
                Err(format!("Authorization failed: {}", reason))
            }
            AuthPromptResult::Success { code, state } => {
                {
                    let mut last = self.last_processed_code.lock().await;
                    if last.as_deref() == Some(code.as_str()) {
                        // Idempotent re-entry guard: one exchange per code.
                        log::debug!("Duplicate authorization event; already processed this code");
                        return Ok(self.store.lock().await.session.is_authenticated());
                    }
                    *last = Some(code.clone());
                }

                let pending = match self.pending.lock().await.take() {
                    Some(p) => p,
                    None => {
                        self.abandon().await;
                        return Err("Authorization code received with no attempt pending".into());
                    }
                };

                if pending.expected_state != state {
                    self.abandon().await;
                    return Err("Authorization state mismatch; discarding code".into());
                }

                self.exchange_code(&code, pending).await?;
                Ok(true)
            }
        }
    }

    /// One-time code-for-token exchange with the matching PKCE verifier.
    /// On success the `{token, user}` pair is installed atomically into the
    /// session, the token handle and the Token Store. On any failure the
    /// session stays unauthenticated and the attempt is over — authorization
    /// codes are single-use, so there is no retry.
    pub async fn exchange_code(
        &self,
        code: &str,
        pending: PendingAuthorization,
    ) -> Result<(), String> {
        let outcome = async {
            let token = self
                .client
                .exchange_code(
                    &self.config.issuer_url,
                    &self.config.client_id,
                    code,
                    &pending.code_verifier,
                    &pending.redirect_uri,
                )
                .await
                .map_err(|e| format!("Token exchange failed: {}", e))?;

            let user = self
                .client
                .get_userinfo(&self.config.issuer_url, &token)
                .await
                .map_err(|e| format!("Fetching user profile failed: {}", e))?;

            Ok::<_, String>((token, user))
        }
        .await;

        match outcome {
            Ok((token, user)) => {
                // Persistence errors are logged, never fatal: the in-memory
                // session is still valid for this process.
                if let Err(e) = TokenStore::save_session(self.ctx.as_ref(), &token, &user) {
                    log::error!("Failed to persist session: {}", e);
                }
                self.tokens.set(Some(token.clone()));
                let mut store = self.store.lock().await;
                store.session.install(token, user);
                log::info!("Login complete");
                Ok(())
            }
            Err(e) => {
                log::error!("{}", e);
                self.abandon().await;
                Err(e)
            }
        }
    }

    /// Convenience wrapper: begin, prompt, handle the outcome.
    pub async fn login(&self) -> Result<bool, String> {
        let Some(request) = self.begin_login().await else {
            return Ok(false);
        };
        let result = self.prompt.begin_authorization(&request).await;
        self.on_authorization_result(result).await
    }

    /// Local logout always succeeds: persisted entries, the token handle,
    /// the session and every per-user cache are cleared. The remote
    /// end-session prompt is best-effort.
    pub async fn logout(&self) {
        if let Err(e) = TokenStore::clear_session(self.ctx.as_ref()) {
            log::error!("Failed to clear persisted session: {}", e);
        }
        self.tokens.set(None);
        {
            let mut store = self.store.lock().await;
            store.session.clear();
            store.clear_user_data();
        }
        *self.pending.lock().await = None;
        *self.last_processed_code.lock().await = None;

        match Url::parse(&format!(
            "{}/v2/logout",
            self.config.issuer_url.trim_end_matches('/')
        )) {
            Ok(mut logout_url) => {
                logout_url
                    .query_pairs_mut()
                    .append_pair("client_id", &self.config.client_id)
                    .append_pair("returnTo", &self.config.redirect_uri);
                if let Err(e) = self.prompt.end_session(logout_url.as_str()).await {
                    log::warn!("Remote end-session failed (local logout complete): {}", e);
                }
            }
            Err(e) => log::warn!("Could not build end-session URL: {}", e),
        }
        log::info!("Logged out");
    }

    /// Failed or cancelled attempt: back to LoggedOut, nothing half-set.
    async fn abandon(&self) {
        *self.pending.lock().await = None;
        self.store.lock().await.session.auth_in_progress = false;
    }
}

// --- Production prompt: loopback redirect listener ---

/// Interactive prompt for terminal use: prints the authorization URL and
/// waits for the browser to hit the loopback redirect URI.
pub struct LoopbackPrompt;

impl AuthPrompt for LoopbackPrompt {
    async fn begin_authorization(&self, request: &AuthorizationRequest) -> AuthPromptResult {
        let addr = match loopback_addr(&request.redirect_uri) {
            Ok(a) => a,
            Err(e) => return AuthPromptResult::Failed(e),
        };

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                return AuthPromptResult::Failed(format!(
                    "Could not listen on {} for the redirect: {}",
                    addr, e
                ));
            }
        };

        println!("Open this URL in your browser to sign in:\n\n  {}\n", request.authorize_url);
        log::info!("Waiting for authorization redirect on {}", addr);

        let (mut stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => return AuthPromptResult::Failed(format!("Redirect listener failed: {}", e)),
        };

        let mut buf = vec![0u8; 4096];
        let n = match stream.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => return AuthPromptResult::Failed(format!("Redirect read failed: {}", e)),
        };
        let request_text = String::from_utf8_lossy(&buf[..n]).to_string();

        let result = parse_redirect_request(&request_text);

        let body = match &result {
            AuthPromptResult::Success { .. } => {
                "<html><body><h2>Signed in.</h2><p>You can return to the terminal.</p></body></html>"
            }
            _ => "<html><body><h2>Sign-in not completed.</h2><p>You can close this tab.</p></body></html>",
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes()).await;

        result
    }

    async fn end_session(&self, logout_url: &str) -> Result<(), String> {
        // Ending the authorization-server session needs a browser too; we
        // only hand the user the URL.
        println!("To also end the provider session, open:\n\n  {}\n", logout_url);
        Ok(())
    }
}

fn loopback_addr(redirect_uri: &str) -> Result<String, String> {
    let uri: Uri = redirect_uri
        .parse()
        .map_err(|e: http::uri::InvalidUri| format!("Invalid redirect_uri: {}", e))?;
    let host = uri.host().ok_or("redirect_uri has no host")?;
    let port = uri.port_u16().ok_or("redirect_uri has no explicit port")?;
    Ok(format!("{}:{}", host, port))
}

/// Parse the browser's `GET /callback?...` request into a prompt result.
/// The query string is attacker-controlled input; decoding goes through
/// `url`, which never rejects or panics on malformed percent sequences.
fn parse_redirect_request(request_text: &str) -> AuthPromptResult {
    let first_line = request_text.lines().next().unwrap_or_default();
    let path = first_line.split_whitespace().nth(1).unwrap_or_default();

    let parsed = match Url::parse("http://localhost/").and_then(|base| base.join(path)) {
        Ok(url) => url,
        Err(e) => return AuthPromptResult::Failed(format!("Malformed redirect request: {}", e)),
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (code, state, error) {
        (_, _, Some(e)) if e == "access_denied" => AuthPromptResult::Cancelled,
        (_, _, Some(e)) => AuthPromptResult::Failed(e),
        (Some(code), Some(state), None) => AuthPromptResult::Success { code, state },
        _ => AuthPromptResult::Failed("Redirect carried no authorization code".into()),
    }
}

// Integration tests for the login flow: PKCE exchange, duplicate-event
// handling, failure and cancellation recovery.
use fitcoach::client::{ApiClient, TokenHandle};
use fitcoach::config::Config;
use fitcoach::context::TestContext;
use fitcoach::session::{AuthPrompt, AuthPromptResult, AuthorizationRequest, SessionManager};
use fitcoach::storage::TokenStore;
use fitcoach::store::AppStore;
use mockito::Server;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Prompt stand-in: answers with a fixed code (echoing the real request
/// state) or a cancellation, without any browser involved.
struct ScriptedPrompt {
    code: Option<String>,
}

impl AuthPrompt for ScriptedPrompt {
    async fn begin_authorization(&self, request: &AuthorizationRequest) -> AuthPromptResult {
        match &self.code {
            Some(code) => AuthPromptResult::Success {
                code: code.clone(),
                state: request.state.clone(),
            },
            None => AuthPromptResult::Cancelled,
        }
    }

    async fn end_session(&self, _logout_url: &str) -> Result<(), String> {
        Ok(())
    }
}

fn test_config(base_url: &str) -> Config {
    Config {
        api_url: base_url.to_string(),
        issuer_url: base_url.to_string(),
        client_id: "client-1".to_string(),
        audience: base_url.to_string(),
        allow_insecure_certs: true,
        ..Config::default()
    }
}

fn build_manager(
    base_url: &str,
    prompt: ScriptedPrompt,
) -> (
    SessionManager<ScriptedPrompt>,
    Arc<Mutex<AppStore>>,
    TokenHandle,
    Arc<TestContext>,
) {
    let config = test_config(base_url);
    let store = Arc::new(Mutex::new(AppStore::new()));
    let tokens = TokenHandle::new();
    let client = ApiClient::new(&config, tokens.clone()).unwrap();
    let ctx = Arc::new(TestContext::new());
    let manager = SessionManager::new(
        store.clone(),
        client,
        tokens.clone(),
        prompt,
        ctx.clone(),
        config,
    );
    (manager, store, tokens, ctx)
}

fn userinfo_body() -> &'static str {
    r#"{"sub": "u1", "email": "a@b.com", "name": "Ada"}"#
}

#[tokio::test]
async fn test_login_installs_and_persists_session() {
    let mut server = Server::new_async().await;

    let mock_token = server
        .mock("POST", "/oauth/token")
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::Regex(r#""grant_type":"authorization_code""#.to_string()),
            mockito::Matcher::Regex(r#""code":"abc123""#.to_string()),
            mockito::Matcher::Regex(r#""code_verifier":"#.to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token": "tok_xyz", "token_type": "Bearer"}"#)
        .create_async()
        .await;

    let mock_userinfo = server
        .mock("GET", "/userinfo")
        .match_header("authorization", "Bearer tok_xyz")
        .with_status(200)
        .with_body(userinfo_body())
        .create_async()
        .await;

    let (manager, store, tokens, ctx) = build_manager(
        &server.url(),
        ScriptedPrompt {
            code: Some("abc123".to_string()),
        },
    );

    let logged_in = manager.login().await.unwrap();
    assert!(logged_in);

    mock_token.assert_async().await;
    mock_userinfo.assert_async().await;

    // Token and user installed together.
    let guard = store.lock().await;
    assert!(guard.session.is_authenticated());
    assert!(!guard.session.auth_in_progress);
    assert_eq!(guard.session.access_token.as_deref(), Some("tok_xyz"));
    let user = guard.session.user.as_ref().unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.display_name, "Ada");
    drop(guard);

    assert_eq!(tokens.get().as_deref(), Some("tok_xyz"));

    // And persisted for the next start.
    let (token, user) = TokenStore::load_session(ctx.as_ref()).unwrap();
    assert_eq!(token, "tok_xyz");
    assert_eq!(user.email, "a@b.com");
}

#[tokio::test]
async fn test_duplicate_authorization_event_exchanges_once() {
    let mut server = Server::new_async().await;

    let mock_token = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token": "tok_xyz"}"#)
        .expect(1)
        .create_async()
        .await;

    let mock_userinfo = server
        .mock("GET", "/userinfo")
        .with_status(200)
        .with_body(userinfo_body())
        .expect(1)
        .create_async()
        .await;

    let (manager, store, _tokens, _ctx) = build_manager(
        &server.url(),
        ScriptedPrompt {
            code: Some("abc123".to_string()),
        },
    );

    let request = manager.begin_login().await.unwrap();
    let event = AuthPromptResult::Success {
        code: "abc123".to_string(),
        state: request.state.clone(),
    };

    assert!(manager.on_authorization_result(event.clone()).await.unwrap());
    // Redelivery of the same code must not hit the token endpoint again.
    assert!(manager.on_authorization_result(event).await.unwrap());

    mock_token.assert_async().await;
    mock_userinfo.assert_async().await;
    assert!(store.lock().await.session.is_authenticated());
}

#[tokio::test]
async fn test_failed_exchange_leaves_no_partial_session() {
    let mut server = Server::new_async().await;

    let _mock_token = server
        .mock("POST", "/oauth/token")
        .with_status(403)
        .with_body(r#"{"error": "invalid_grant"}"#)
        .create_async()
        .await;

    let (manager, store, tokens, ctx) = build_manager(
        &server.url(),
        ScriptedPrompt {
            code: Some("badcode".to_string()),
        },
    );

    let err = manager.login().await.unwrap_err();
    assert!(err.contains("Token exchange failed"), "got: {}", err);

    let guard = store.lock().await;
    assert!(!guard.session.is_authenticated());
    assert!(guard.session.access_token.is_none());
    assert!(guard.session.user.is_none());
    assert!(!guard.session.auth_in_progress);
    drop(guard);

    assert!(tokens.get().is_none());
    assert!(TokenStore::load_session(ctx.as_ref()).is_none());

    // The attempt is over; a new one can start.
    assert!(manager.begin_login().await.is_some());
}

#[tokio::test]
async fn test_cancelled_login_is_recoverable() {
    let server = Server::new_async().await;

    let (manager, store, _tokens, _ctx) =
        build_manager(&server.url(), ScriptedPrompt { code: None });

    let logged_in = manager.login().await.unwrap();
    assert!(!logged_in);

    let guard = store.lock().await;
    assert!(!guard.session.is_authenticated());
    assert!(!guard.session.auth_in_progress);
    drop(guard);

    assert!(manager.begin_login().await.is_some());
}

#[tokio::test]
async fn test_second_login_attempt_is_rejected_while_in_progress() {
    let server = Server::new_async().await;

    let (manager, _store, _tokens, _ctx) = build_manager(
        &server.url(),
        ScriptedPrompt {
            code: Some("abc123".to_string()),
        },
    );

    assert!(manager.begin_login().await.is_some());
    assert!(manager.begin_login().await.is_none());
}

#[tokio::test]
async fn test_state_mismatch_discards_code() {
    let mut server = Server::new_async().await;

    let mock_token = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token": "tok_xyz"}"#)
        .expect(0)
        .create_async()
        .await;

    let (manager, store, _tokens, _ctx) = build_manager(
        &server.url(),
        ScriptedPrompt {
            code: Some("abc123".to_string()),
        },
    );

    manager.begin_login().await.unwrap();
    let err = manager
        .on_authorization_result(AuthPromptResult::Success {
            code: "abc123".to_string(),
            state: "forged-state".to_string(),
        })
        .await
        .unwrap_err();
    assert!(err.contains("state mismatch"), "got: {}", err);

    mock_token.assert_async().await;
    assert!(!store.lock().await.session.is_authenticated());
}

#[tokio::test]
async fn test_fresh_pkce_material_per_attempt() {
    let server = Server::new_async().await;

    let (manager, _store, _tokens, _ctx) =
        build_manager(&server.url(), ScriptedPrompt { code: None });

    let first = manager.begin_login().await.unwrap();
    manager
        .on_authorization_result(AuthPromptResult::Cancelled)
        .await
        .unwrap();
    let second = manager.begin_login().await.unwrap();

    assert_ne!(first.state, second.state);
    assert_ne!(first.authorize_url, second.authorize_url);
}

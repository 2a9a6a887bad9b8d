// Integration tests for the account profile: load and partial update.
use fitcoach::client::{ApiClient, TokenHandle};
use fitcoach::config::Config;
use fitcoach::controller::PlanController;
use fitcoach::model::{ProfileUpdate, User};
use fitcoach::store::{AppStore, FRESHNESS_WINDOW_MS};
use mockito::Server;
use std::sync::Arc;
use tokio::sync::Mutex;

const PROFILE_JSON: &str = r#"{
    "id": "u1",
    "username": "ada",
    "email": "a@b.com",
    "firstName": "Ada",
    "lastName": null,
    "role": "client",
    "phoneNumber": null
}"#;

fn build_controller(base_url: &str) -> (PlanController, Arc<Mutex<AppStore>>, TokenHandle) {
    let config = Config {
        api_url: base_url.to_string(),
        issuer_url: base_url.to_string(),
        client_id: "client-1".to_string(),
        allow_insecure_certs: true,
        ..Config::default()
    };
    let store = Arc::new(Mutex::new(AppStore::new()));
    let tokens = TokenHandle::new();
    let client = ApiClient::new(&config, tokens.clone()).unwrap();
    let controller = PlanController::new(store.clone(), client, FRESHNESS_WINDOW_MS);
    (controller, store, tokens)
}

async fn sign_in(store: &Arc<Mutex<AppStore>>, tokens: &TokenHandle) {
    tokens.set(Some("tok_abc".to_string()));
    store.lock().await.session.install(
        "tok_abc".to_string(),
        User {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            display_name: "Ada".to_string(),
            avatar_url: None,
        },
    );
}

#[tokio::test]
async fn test_profile_load_populates_cache() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/users/me")
        .match_header("authorization", "Bearer tok_abc")
        .with_status(200)
        .with_body(PROFILE_JSON)
        .create_async()
        .await;

    let (controller, store, tokens) = build_controller(&server.url());
    sign_in(&store, &tokens).await;

    controller.load_profile().await.unwrap();
    mock.assert_async().await;

    let guard = store.lock().await;
    let profile = guard.profile.snapshot.as_ref().unwrap();
    assert_eq!(profile.username, "ada");
    assert_eq!(profile.first_name.as_deref(), Some("Ada"));
    assert!(profile.last_name.is_none());
}

#[tokio::test]
async fn test_update_sends_only_set_fields_and_replaces_snapshot() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/users/me")
        .match_header("content-type", "application/json")
        .match_body(mockito::Matcher::JsonString(
            r#"{"lastName": "Lovelace"}"#.to_string(),
        ))
        .with_status(200)
        .with_body(
            r#"{
                "id": "u1",
                "username": "ada",
                "email": "a@b.com",
                "firstName": "Ada",
                "lastName": "Lovelace",
                "role": "client"
            }"#,
        )
        .create_async()
        .await;

    let (controller, store, tokens) = build_controller(&server.url());
    sign_in(&store, &tokens).await;

    controller
        .update_profile(ProfileUpdate {
            last_name: Some("Lovelace".to_string()),
            ..ProfileUpdate::default()
        })
        .await
        .unwrap();

    mock.assert_async().await;

    // The server's answer is the authoritative snapshot.
    let guard = store.lock().await;
    let profile = guard.profile.snapshot.as_ref().unwrap();
    assert_eq!(profile.last_name.as_deref(), Some("Lovelace"));
    assert!(guard.profile.last_fetch_ms.is_some());
}

#[tokio::test]
async fn test_empty_update_sends_nothing() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/users/me")
        .expect(0)
        .create_async()
        .await;

    let (controller, store, tokens) = build_controller(&server.url());
    sign_in(&store, &tokens).await;

    controller
        .update_profile(ProfileUpdate::default())
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_failed_update_records_error_and_keeps_profile() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("PUT", "/users/me")
        .with_status(422)
        .with_body(r#"{"message": "phone number invalid"}"#)
        .create_async()
        .await;

    let (controller, store, tokens) = build_controller(&server.url());
    sign_in(&store, &tokens).await;

    // Seed the cache with a previously loaded profile.
    {
        let mut guard = store.lock().await;
        let profile = serde_json::from_str(PROFILE_JSON).unwrap();
        guard.profile.complete(profile, 1_000);
    }

    let err = controller
        .update_profile(ProfileUpdate {
            phone_number: Some("not-a-number".to_string()),
            ..ProfileUpdate::default()
        })
        .await
        .unwrap_err();
    assert!(err.contains("422"), "got: {}", err);

    let guard = store.lock().await;
    assert_eq!(
        guard.profile.snapshot.as_ref().unwrap().first_name.as_deref(),
        Some("Ada")
    );
    assert!(guard.profile.last_error.is_some());
}

// File: ./src/client/core.rs
// Thin REST client for the coaching service plus the two authorization-server
// calls the session manager needs (token exchange, userinfo).
use crate::client::auth::{BearerAuthLayer, BearerAuthService, TokenHandle};
use crate::client::cert::NoVerifier;
use crate::config::Config;
use crate::model::{MealPlan, Profile, ProfileUpdate, Program, User, UserInfo, WeeklySchedule};

use http::{Method, Request, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower_layer::Layer;

type HttpClient = Client<
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    String,
>;

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    code: &'a str,
    code_verifier: &'a str,
    redirect_uri: &'a str,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    svc: BearerAuthService<HttpClient>,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &Config, tokens: TokenHandle) -> Result<Self, String> {
        // Validate early so a typo in the config surfaces as one clear error.
        let _: Uri = config
            .api_url
            .parse()
            .map_err(|e: http::uri::InvalidUri| format!("Invalid api_url: {}", e))?;

        let tls_config_builder = rustls::ClientConfig::builder();

        let tls_config = if config.allow_insecure_certs {
            tls_config_builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        } else {
            let mut root_store = rustls::RootCertStore::empty();
            let result = rustls_native_certs::load_native_certs();
            root_store.add_parsable_certificates(result.certs);
            if root_store.is_empty() {
                return Err("No valid system certificates found.".to_string());
            }
            tls_config_builder
                .with_root_certificates(root_store)
                .with_no_client_auth()
        };

        let https_connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();

        let http_client = Client::builder(TokioExecutor::new()).build(https_connector);
        let svc = BearerAuthLayer::new(tokens).layer(http_client);

        Ok(Self {
            svc,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
        })
    }

    // --- TRANSPORT ---

    fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        bearer: Option<&str>,
    ) -> Result<Request<String>, String> {
        let mut builder = Request::builder()
            .method(method)
            .uri(url)
            .header(http::header::ACCEPT, "application/json");

        if body.is_some() {
            builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        }
        if let Some(token) = bearer {
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {}", token));
        }

        builder
            .body(body.unwrap_or_default())
            .map_err(|e| format!("Failed to build request for {}: {}", url, e))
    }

    async fn send(&self, req: Request<String>) -> Result<(StatusCode, Vec<u8>), String> {
        let url = req.uri().to_string();
        let fut = self.svc.clone().oneshot(req);

        let response = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                format!(
                    "Request to {} timed out after {}s",
                    url,
                    self.timeout.as_secs()
                )
            })?
            .map_err(|e| format!("Network error for {}: {}", url, e))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| format!("Failed to read response from {}: {}", url, e))?
            .to_bytes()
            .to_vec();

        Ok((status, bytes))
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        bearer: Option<&str>,
    ) -> Result<T, String> {
        let req = self.build_request(method, url, body, bearer)?;
        let (status, bytes) = self.send(req).await?;

        if !status.is_success() {
            let snippet = String::from_utf8_lossy(&bytes[..bytes.len().min(200)]).to_string();
            return Err(format!("API error {} for {}: {}", status, url, snippet));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| format!("Malformed response from {}: {}", url, e))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, String> {
        self.execute_json(Method::GET, &self.url(path), None, None)
            .await
    }

    async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, String> {
        let json = serde_json::to_string(body).map_err(|e| e.to_string())?;
        self.execute_json(Method::PUT, &self.url(path), Some(json), None)
            .await
    }

    // --- REST ENDPOINTS ---

    pub async fn get_current_user(&self) -> Result<Profile, String> {
        self.get_json("/users/me").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, String> {
        self.put_json("/users/me", update).await
    }

    /// The service answers `null` when no plan is currently assigned.
    pub async fn get_current_meal_plan(&self) -> Result<Option<MealPlan>, String> {
        let url = self.url("/user-meal-plans/current");
        let req = self.build_request(Method::GET, &url, None, None)?;
        let (status, bytes) = self.send(req).await?;

        if !status.is_success() {
            let snippet = String::from_utf8_lossy(&bytes[..bytes.len().min(200)]).to_string();
            return Err(format!("API error {} for {}: {}", status, url, snippet));
        }
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| format!("Malformed response from {}: {}", url, e))
    }

    pub async fn list_meal_plans(&self) -> Result<Vec<MealPlan>, String> {
        self.get_json("/user-meal-plans/my-plans").await
    }

    pub async fn get_weekly_schedule(&self) -> Result<WeeklySchedule, String> {
        self.get_json("/weekly-programs/my-schedule").await
    }

    pub async fn list_programs(&self) -> Result<Vec<Program>, String> {
        self.get_json("/programs/my-programs").await
    }

    // --- AUTHORIZATION SERVER ---

    /// One-shot authorization-code exchange. Runs without the shared bearer
    /// (there is no session yet).
    pub async fn exchange_code(
        &self,
        issuer_url: &str,
        client_id: &str,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<String, String> {
        let body = serde_json::to_string(&TokenRequest {
            grant_type: "authorization_code",
            client_id,
            code,
            code_verifier,
            redirect_uri,
        })
        .map_err(|e| e.to_string())?;

        let url = format!("{}/oauth/token", issuer_url.trim_end_matches('/'));
        let resp: TokenResponse = self
            .execute_json(Method::POST, &url, Some(body), None)
            .await?;
        Ok(resp.access_token)
    }

    /// Fetch the user's identity with an explicit token; the session is not
    /// installed yet at this point of the exchange.
    pub async fn get_userinfo(&self, issuer_url: &str, token: &str) -> Result<User, String> {
        let url = format!("{}/userinfo", issuer_url.trim_end_matches('/'));
        let info: UserInfo = self
            .execute_json(Method::GET, &url, None, Some(token))
            .await?;
        Ok(info.into())
    }
}

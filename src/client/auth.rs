// Bearer-token injection for outbound requests.
//
// The token lives behind a shared handle because it changes at runtime
// (login installs it, logout clears it); every request reads the handle at
// send time, so no client rebuild is needed across session transitions.
use http::{HeaderValue, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tower_service::Service;

/// Shared access-token slot, read per request by the auth middleware and
/// written by the session manager.
#[derive(Clone, Debug, Default)]
pub struct TokenHandle {
    inner: Arc<RwLock<Option<String>>>,
}

impl TokenHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: Option<String>) {
        // Lock poisoning only happens if a writer panicked; recover the slot.
        match self.inner.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn get(&self) -> Option<String> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

#[derive(Clone, Debug)]
pub struct BearerAuthLayer {
    tokens: TokenHandle,
}

impl BearerAuthLayer {
    pub fn new(tokens: TokenHandle) -> Self {
        Self { tokens }
    }
}

impl<S> tower_layer::Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            tokens: self.tokens.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BearerAuthService<S> {
    inner: S,
    tokens: TokenHandle,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for BearerAuthService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Requests that already carry an Authorization header (e.g. the
        // userinfo call made before the session is installed) win over the
        // shared handle.
        if !req.headers().contains_key(http::header::AUTHORIZATION)
            && let Some(token) = self.tokens.get()
            && let Ok(val) = HeaderValue::from_str(&format!("Bearer {}", token))
        {
            req.headers_mut().insert(http::header::AUTHORIZATION, val);
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_handle_set_and_clear() {
        let handle = TokenHandle::new();
        assert!(!handle.is_set());

        handle.set(Some("tok_xyz".to_string()));
        assert_eq!(handle.get().as_deref(), Some("tok_xyz"));

        handle.set(None);
        assert!(!handle.is_set());
    }

    #[test]
    fn test_token_handle_is_shared_between_clones() {
        let handle = TokenHandle::new();
        let clone = handle.clone();
        handle.set(Some("tok_abc".to_string()));
        assert_eq!(clone.get().as_deref(), Some("tok_abc"));
    }
}

// Request gateway
//
// Wraps `reqwest::Client` with bearer-credential injection, busy-counter
// bookkeeping, validation-error interception and a single error
// normalization step. Authorization failures are handed to the refresh
// coordinator, which replays the request once with the new credential.
// Typed endpoints (greetings, account, hub) are implemented as inherent
// methods in `endpoints/` to keep this module focused on transport.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};
use url::Url;

use crate::activity::{ActivityKind, ActivityTracker};
use crate::auth::Session;
use crate::error::{Error, RequestError};
use crate::link;
use crate::refresh::RefreshCoordinator;
use crate::transport::TransportConfig;
use crate::validation::{ValidationPayload, ValidationRegistry};
use crate::{LOGIN_PATH, REFRESH_PATH};

// ── Request / response shapes ────────────────────────────────────────

/// Outbound body encoding.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// Pre-encoded `application/x-www-form-urlencoded` payload.
    Form(String),
}

/// Everything needed to (re)issue a request.
///
/// Kept around for the lifetime of a call so an unauthorized request can be
/// replayed verbatim with a fresh credential.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the API base, always starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_owned(), value.to_string()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, RequestError> {
        let value = serde_json::to_value(body)
            .map_err(|e| RequestError::new(0, format!("invalid request body: {e}")))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn form(mut self, encoded: impl Into<String>) -> Self {
        self.body = RequestBody::Form(encoded.into());
        self
    }
}

/// A successful response, fully buffered.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_str(&self.body).map_err(|e| {
            let end = self
                .body
                .char_indices()
                .nth(200)
                .map_or(self.body.len(), |(i, _)| i);
            let preview = &self.body[..end];
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: self.body.clone(),
            }
        })
    }

    /// Push-hub URL advertised through `Link: <...>; rel=mercure`.
    pub fn hub_url(&self) -> Option<Url> {
        self.headers
            .get_all(reqwest::header::LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(link::find_hub_link)
    }
}

// ── Failure classification ───────────────────────────────────────────

/// Raw failure before normalization.
#[derive(Debug)]
pub(crate) enum Failure {
    /// No usable response (connect, timeout, body read, bad URL).
    Transport(reqwest::Error),
    /// A response arrived with a non-success status.
    Status { status: StatusCode, body: String },
    /// Already normalized upstream; passed through unchanged.
    Normalized(RequestError),
}

impl Failure {
    fn is_unauthorized(&self) -> bool {
        match self {
            Self::Transport(_) => false,
            Self::Status { status, .. } => *status == StatusCode::UNAUTHORIZED,
            Self::Normalized(e) => e.is_unauthorized(),
        }
    }
}

/// Server error bodies sometimes carry a better message than the status line.
#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// The one place every failed call is reduced to a [`RequestError`].
pub(crate) fn normalize(failure: Failure) -> RequestError {
    match failure {
        Failure::Transport(e) => RequestError::from(e),
        Failure::Status { status, body } => {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message.or(b.error))
                .filter(|m| !m.is_empty());
            match message {
                Some(message) => RequestError::new(status.as_u16(), message),
                None => RequestError::from_status(status),
            }
        }
        Failure::Normalized(e) => e,
    }
}

// ── Gateway ──────────────────────────────────────────────────────────

/// Authenticated HTTP gateway to the backend API.
///
/// Cheaply cloneable; all clones share the session, counters, validation
/// registry and refresh state.
#[derive(Clone)]
pub struct Gateway {
    pub(crate) inner: Arc<GatewayInner>,
}

pub(crate) struct GatewayInner {
    http: reqwest::Client,
    base_url: Url,
    pub(crate) session: Arc<Session>,
    activity: ActivityTracker,
    validation: ValidationRegistry,
    pub(crate) refresh: RefreshCoordinator,
}

impl Gateway {
    /// Build a gateway with default counters and an empty validation registry.
    pub fn new(
        base_url: Url,
        session: Arc<Session>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(
            http,
            base_url,
            session,
            ActivityTracker::default(),
            ValidationRegistry::new(),
        ))
    }

    /// Build a gateway around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        session: Arc<Session>,
        activity: ActivityTracker,
        validation: ValidationRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                http,
                base_url,
                session,
                activity,
                validation,
                refresh: RefreshCoordinator::new(),
            }),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.inner.activity
    }

    pub fn validation(&self) -> &ValidationRegistry {
        &self.inner.validation
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    // ── Verbs ────────────────────────────────────────────────────────

    pub async fn get(&self, path: &str) -> Result<ApiResponse, RequestError> {
        self.send(&RequestDescriptor::get(path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, RequestError> {
        self.send(&RequestDescriptor::post(path).json(body)?).await
    }

    /// POST a pre-encoded form body.
    pub async fn post_raw(&self, path: &str, form: &str) -> Result<ApiResponse, RequestError> {
        self.send(&RequestDescriptor::post(path).form(form)).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, RequestError> {
        self.send(&RequestDescriptor::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, RequestError> {
        self.send(&RequestDescriptor::delete(path)).await
    }

    /// Issue a request with the current credential, recovering once from an
    /// authorization failure via the refresh coordinator.
    pub async fn send(&self, req: &RequestDescriptor) -> Result<ApiResponse, RequestError> {
        let _guard = self
            .inner
            .activity
            .begin(ActivityKind::for_method(&req.method), &req.path);

        let credential = self.inner.session.access_token();
        let failure = match self.dispatch(req, &credential).await {
            Ok(resp) => return Ok(resp),
            Err(failure) => failure,
        };

        if failure.is_unauthorized() && self.may_refresh(&req.path) {
            return self.recover_unauthorized(req, &credential).await;
        }

        Err(normalize(failure))
    }

    /// Login and the refresh call itself are never refreshed, and there is
    /// nothing to refresh with once the session is gone.
    fn may_refresh(&self, path: &str) -> bool {
        path != LOGIN_PATH && path != REFRESH_PATH && self.inner.session.is_authenticated()
    }

    async fn recover_unauthorized(
        &self,
        req: &RequestDescriptor,
        stale: &str,
    ) -> Result<ApiResponse, RequestError> {
        let current = self.inner.session.access_token();
        let credential = if current == stale {
            warn!(path = %req.path, "access token rejected, refreshing");
            self.inner.refresh.refresh(self).await?
        } else {
            debug!(path = %req.path, "credential rotated while in flight, replaying");
            current
        };

        // Exactly one replay. A second 401 here is final.
        self.dispatch(req, &credential).await.map_err(normalize)
    }

    // ── Transport ────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, RequestError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}"))
            .map_err(|e| RequestError::new(0, format!("invalid URL for {path}: {e}")))
    }

    /// Send once with `credential` (empty means no `Authorization` header).
    ///
    /// Validation-error payloads are forwarded to the registry whatever the
    /// status; the response itself is returned unmodified.
    pub(crate) async fn dispatch(
        &self,
        req: &RequestDescriptor,
        credential: &str,
    ) -> Result<ApiResponse, Failure> {
        let url = self.url(&req.path).map_err(Failure::Normalized)?;
        debug!("{} {}", req.method, url);

        let mut builder = self.inner.http.request(req.method.clone(), url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if !credential.is_empty() {
            builder = builder.bearer_auth(credential);
        }
        builder = match &req.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(encoded) => builder
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                )
                .body(encoded.clone()),
        };

        let resp = builder.send().await.map_err(Failure::Transport)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().await.map_err(Failure::Transport)?;
        trace!(%status, len = body.len(), "response received");

        if let Some(errors) = ValidationPayload::extract(&body) {
            debug!(count = errors.len(), path = %req.path, "validation errors in response");
            for error in errors {
                self.inner.validation.add(error);
            }
        }

        if status.is_success() {
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        } else {
            Err(Failure::Status { status, body })
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.inner.base_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_prefers_server_message() {
        let err = normalize(Failure::Status {
            status: StatusCode::UNAUTHORIZED,
            body: r#"{"code":401,"message":"Expired JWT Token"}"#.into(),
        });
        assert_eq!(err, RequestError::new(401, "Expired JWT Token"));
    }

    #[test]
    fn normalize_falls_back_to_reason_phrase() {
        let err = normalize(Failure::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "<html>oops</html>".into(),
        });
        assert_eq!(err, RequestError::new(500, "Internal Server Error"));
    }

    #[test]
    fn normalize_passes_through_normalized_errors() {
        let original = RequestError::new(418, "teapot");
        assert_eq!(normalize(Failure::Normalized(original.clone())), original);
    }

    #[test]
    fn descriptor_builders() {
        let req = RequestDescriptor::get("/greetings")
            .query("limit", 10)
            .query("offset", 0);
        assert_eq!(req.method, Method::GET);
        assert_eq!(
            req.query,
            vec![("limit".into(), "10".into()), ("offset".into(), "0".into())]
        );

        let form = RequestDescriptor::post("/pusher-auth").form("socket_id=1&channel_name=x");
        assert!(matches!(form.body, RequestBody::Form(ref s) if s == "socket_id=1&channel_name=x"));
    }
}

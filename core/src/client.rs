//! The client facade pages and services talk to.
//!
//! # Design
//! `ApiClient` pairs a `Transport` with a `SessionRenewalCoordinator`. Every
//! call made through `send` gets one automatic session renewal: a 401 on the
//! first attempt hands control to the coordinator, and once the session is
//! renewed the request is replayed exactly once. Any other failure, and a
//! 401 on the replay, is returned to the caller unchanged.
//!
//! The refresh call itself goes straight to the transport. Routing it
//! through `send` would let a 401 from the refresh endpoint re-enter the
//! coordinator it is running under.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::coordinator::SessionRenewalCoordinator;
use crate::envelope::RequestEnvelope;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::navigation::Navigator;
use crate::transport::Transport;

/// Authenticated HTTP client with single-flight session renewal.
///
/// Cloning is cheap and clones share the same transport and coordinator.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    coordinator: Arc<SessionRenewalCoordinator>,
}

impl ApiClient {
    /// Build a client that owns its own renewal coordinator.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, navigator: Arc<dyn Navigator>) -> Self {
        let coordinator = Arc::new(SessionRenewalCoordinator::from_config(&config, navigator));
        Self::with_coordinator(config, transport, coordinator)
    }

    /// Build a client that renews sessions through a coordinator shared with
    /// other clients talking to the same session.
    pub fn with_coordinator(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        coordinator: Arc<SessionRenewalCoordinator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            coordinator,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<SessionRenewalCoordinator> {
        &self.coordinator
    }

    pub fn build_request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            path: self.config.url(path),
            headers: Vec::new(),
            body: None,
            with_credentials: self.config.with_credentials,
        }
    }

    pub fn build_json_request<T: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut request = self.build_request(method, path);
        request
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        request.body = Some(body);
        Ok(request)
    }

    /// The session refresh call: a body-less POST that relies on the
    /// credential cookies alone.
    pub fn build_refresh(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            path: self.config.refresh_url(),
            headers: Vec::new(),
            body: None,
            with_credentials: true,
        }
    }

    /// Send `request`, renewing the session and replaying once on a 401.
    ///
    /// Resolves to the response for a 2xx status. Non-2xx statuses become
    /// `ApiError` variants; when the renewal fails, the caller receives the
    /// shared `RefreshFailed` value instead of the original 401.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut envelope = RequestEnvelope::new(request);
        loop {
            let err = match self.attempt(envelope.request()).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            if !err.is_unauthorized() || envelope.is_retried() {
                return Err(err);
            }

            envelope.mark_retried();
            debug!(
                method = %envelope.request().method,
                url = %envelope.request().path,
                "authorization failed, renewing session"
            );
            self.coordinator.renew(|| self.refresh_session()).await?;
        }
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse, ApiError> {
        self.send(self.build_request(HttpMethod::Get, path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<HttpResponse, ApiError> {
        self.send(self.build_request(HttpMethod::Delete, path)).await
    }

    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<HttpResponse, ApiError> {
        self.send(self.build_json_request(HttpMethod::Post, path, body)?).await
    }

    pub async fn put_json<T: Serialize>(&self, path: &str, body: &T) -> Result<HttpResponse, ApiError> {
        self.send(self.build_json_request(HttpMethod::Put, path, body)?).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.get(path).await?;
        parse_json(&response)
    }

    /// One raw transport round-trip: no status classification, no renewal.
    pub(crate) async fn transport_send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = %request.method, url = %request.path, "sending request");
        self.transport.send(request).await
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let response = self.transport_send(request).await?;
        check_success(response)
    }

    async fn refresh_session(&self) -> Result<(), ApiError> {
        self.attempt(&self.build_refresh()).await.map(|_| ())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

/// Map a non-2xx status to the matching `ApiError` variant.
pub(crate) fn check_success(response: HttpResponse) -> Result<HttpResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(status_error(response))
}

/// Like `check_success`, but requires one specific status.
pub(crate) fn check_status(response: HttpResponse, expected: u16) -> Result<HttpResponse, ApiError> {
    if response.status == expected {
        return Ok(response);
    }
    if response.is_success() {
        return Err(ApiError::HttpError {
            status: response.status,
            body: response.body,
        });
    }
    Err(status_error(response))
}

fn status_error(response: HttpResponse) -> ApiError {
    match response.status {
        401 => ApiError::Unauthorized { body: response.body },
        404 => ApiError::NotFound,
        status => ApiError::HttpError {
            status,
            body: response.body,
        },
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::LogNavigator;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            Err(ApiError::Transport("connection refused".to_string()))
        }
    }

    fn client() -> ApiClient {
        ApiClient::new(
            ClientConfig::new("http://localhost:8080/api"),
            Arc::new(Unreachable),
            Arc::new(LogNavigator),
        )
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_request_joins_base_url() {
        let req = client().build_request(HttpMethod::Get, "/customers/bookings");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:8080/api/customers/bookings");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
        assert!(req.with_credentials);
    }

    #[test]
    fn build_request_honours_credentials_flag() {
        let client = ApiClient::new(
            ClientConfig::new("http://localhost:8080/api").with_credentials(false),
            Arc::new(Unreachable),
            Arc::new(LogNavigator),
        );
        assert!(!client.build_request(HttpMethod::Get, "/public/services").with_credentials);
    }

    #[test]
    fn build_json_request_sets_content_type() {
        let body = serde_json::json!({ "status": "CONFIRMED" });
        let req = client()
            .build_json_request(HttpMethod::Put, "/vendors/bookings/7/status", &body)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        let sent: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, body);
    }

    #[test]
    fn build_refresh_is_bodyless_post() {
        let req = client().build_refresh();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:8080/api/auth/refresh-token");
        assert!(req.body.is_none());
        assert!(req.with_credentials);
    }

    #[test]
    fn check_success_classifies_statuses() {
        assert!(check_success(response(204, "")).is_ok());
        assert!(matches!(
            check_success(response(401, "Token has expired")),
            Err(ApiError::Unauthorized { body }) if body == "Token has expired"
        ));
        assert!(matches!(check_success(response(404, "")), Err(ApiError::NotFound)));
        assert!(matches!(
            check_success(response(500, "boom")),
            Err(ApiError::HttpError { status: 500, .. })
        ));
    }

    #[test]
    fn check_status_rejects_other_success_codes() {
        assert!(check_status(response(201, "{}"), 201).is_ok());
        assert!(matches!(
            check_status(response(200, "{}"), 201),
            Err(ApiError::HttpError { status: 200, .. })
        ));
    }

    #[test]
    fn parse_json_bad_body() {
        let err = parse_json::<serde_json::Value>(&response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[tokio::test]
    async fn transport_failure_skips_renewal() {
        let client = client();
        let err = client.get("/orders").await.unwrap_err();
        assert_eq!(err, ApiError::Transport("connection refused".to_string()));
        assert!(!client.coordinator().is_refreshing());
    }
}

//! The single-request primitive the client is built on.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one HTTP round-trip.
///
/// Implementations return `Ok` for every status the server answers with,
/// including 4xx and 5xx; status interpretation belongs to the client.
/// `Err` is reserved for failures that produced no response at all and
/// should use `ApiError::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

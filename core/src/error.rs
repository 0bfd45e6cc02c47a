//! Error types for the booking API client.
//!
//! # Design
//! `ApiError` is `Clone` so a single refresh failure can be handed to every
//! caller that waited on it. Transport failures carry their message as a
//! `String` for the same reason. `Unauthorized` is split out from
//! `HttpError` because it is the only status the session coordinator reacts
//! to; `NotFound` keeps its own variant because callers routinely branch on it.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors returned by `ApiClient` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server returned 401.
    #[error("unauthorized: {body}")]
    Unauthorized { body: String },

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 401 or 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The session refresh call failed. Every caller affected by the same
    /// refresh cycle receives a clone of the same `Arc`.
    #[error("session refresh failed: {0}")]
    RefreshFailed(#[source] Arc<ApiError>),

    /// The refresh call did not finish within the configured limit.
    #[error("session refresh timed out after {0:?}")]
    RefreshTimedOut(Duration),

    /// The caller driving the refresh went away before it finished.
    #[error("session refresh abandoned before completion")]
    RefreshAbandoned,

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn is_refresh_failure(&self) -> bool {
        matches!(self, ApiError::RefreshFailed(_))
    }
}

/// Errors raised while loading a `ClientConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("malformed client configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

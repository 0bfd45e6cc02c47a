//! Authenticated API client core for the booking marketplace.
//!
//! # Overview
//! Wraps a caller-supplied `Transport` with cookie-session renewal: when a
//! request comes back 401, one refresh call is issued, every request that
//! failed meanwhile waits for it, and each is replayed once when it
//! succeeds. When the refresh fails, all of them receive the same error and
//! the `Navigator` is sent to the login location.
//!
//! # Design
//! - `ApiClient` is the facade; it owns (or shares) a
//!   `SessionRenewalCoordinator` and never retries a request more than once.
//! - The coordinator is single-flight: exactly one refresh per cycle, no
//!   matter how many requests fail concurrently.
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   the transport decides how to move them over the wire.
//! - DTOs are defined independently from the mock-server crate; the live
//!   integration tests catch schema drift.

pub mod auth;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod http;
pub mod navigation;
pub mod transport;
pub mod types;
pub mod waiters;

pub use async_trait::async_trait;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use coordinator::SessionRenewalCoordinator;
pub use envelope::RequestEnvelope;
pub use error::{ApiError, ConfigError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use navigation::{LogNavigator, Navigator};
pub use transport::Transport;
pub use types::{
    Authority, ChangePasswordRequest, CurrentUser, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse,
};
pub use waiters::{RenewalOutcome, Waiter, WaiterQueue};

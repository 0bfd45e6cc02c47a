use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{
    net::TcpListener,
    sync::{Notify, RwLock},
};
use uuid::Uuid;

pub const ACCESS_COOKIE: &str = "jwt";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const REFRESH_PATH: &str = "/api/auth/refresh-token";

const ACCESS_MAX_AGE_SECS: u64 = 24 * 60 * 60;
const REFRESH_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Role entry in the login response, shaped like a granted authority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub authority: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub email: String,
    pub roles: Vec<Authority>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub surname: String,
    pub phone_number: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub pic_url: Option<String>,
    pub role_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurrentUser {
    pub email: String,
    pub roles: Vec<String>,
}

/// Payload of the protected marketplace resources.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    pub resource: String,
    pub owner: String,
}

#[derive(Clone, Debug)]
struct Account {
    password: String,
    roles: Vec<String>,
}

#[derive(Debug, Default)]
struct Sessions {
    accounts: HashMap<String, Account>,
    /// access token -> email
    access: HashMap<String, String>,
    /// refresh token -> email
    refresh: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Stats {
    refresh_calls: AtomicUsize,
    refresh_delay_ms: AtomicU64,
    refresh_held: AtomicBool,
    refresh_released: Notify,
}

/// Shared backend state. Cloning yields another handle on the same data, so
/// tests keep one to steer the server while it runs.
#[derive(Clone, Debug)]
pub struct AppState {
    sessions: Arc<RwLock<Sessions>>,
    stats: Arc<Stats>,
}

impl AppState {
    /// State seeded with one customer and one vendor account.
    pub fn new() -> Self {
        let mut sessions = Sessions::default();
        sessions.accounts.insert(
            "customer@example.com".to_string(),
            Account {
                password: "password123".to_string(),
                roles: vec!["ROLE_CUSTOMER".to_string()],
            },
        );
        sessions.accounts.insert(
            "vendor@example.com".to_string(),
            Account {
                password: "password123".to_string(),
                roles: vec!["ROLE_VENDOR".to_string()],
            },
        );
        Self {
            sessions: Arc::new(RwLock::new(sessions)),
            stats: Arc::default(),
        }
    }

    pub async fn add_account(&self, email: &str, password: &str, roles: &[&str]) {
        self.sessions.write().await.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
            },
        );
    }

    /// Invalidate every access token; refresh tokens stay valid.
    pub async fn expire_access_tokens(&self) {
        self.sessions.write().await.access.clear();
    }

    pub async fn revoke_refresh_tokens(&self) {
        self.sessions.write().await.refresh.clear();
    }

    /// Hold every refresh call for `delay` before answering it.
    pub fn set_refresh_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.stats.refresh_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Park refresh calls until `release_refreshes`.
    pub fn hold_refreshes(&self) {
        self.stats.refresh_held.store(true, Ordering::SeqCst);
    }

    pub fn release_refreshes(&self) {
        self.stats.refresh_held.store(false, Ordering::SeqCst);
        self.stats.refresh_released.notify_waiters();
    }

    pub fn refresh_calls(&self) -> usize {
        self.stats.refresh_calls.load(Ordering::SeqCst)
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<String, (StatusCode, &'static str)> {
        let token = cookie(headers, ACCESS_COOKIE)
            .ok_or((StatusCode::UNAUTHORIZED, "No JWT token found in cookies"))?;
        let sessions = self.sessions.read().await;
        sessions
            .access
            .get(&token)
            .cloned()
            .ok_or((StatusCode::UNAUTHORIZED, "Token has expired"))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn app() -> Router {
    router(AppState::new())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/auth/me", get(current_user))
        .route(REFRESH_PATH, post(refresh_token))
        .route("/api/auth/logout", post(logout))
        .route("/api/orders", get(orders))
        .route("/api/profile", get(profile))
        .route("/api/bookings", get(bookings))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, AppState::new()).await
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

/// Value of cookie `name` from the request's `Cookie` headers.
fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn access_cookie(token: &str) -> String {
    format!("{ACCESS_COOKIE}={token}; Path=/; HttpOnly; Max-Age={ACCESS_MAX_AGE_SECS}")
}

fn refresh_cookie(token: &str) -> String {
    format!("{REFRESH_COOKIE}={token}; Path={REFRESH_PATH}; HttpOnly; Max-Age={REFRESH_MAX_AGE_SECS}")
}

fn expired_cookie(name: &str, path: &str) -> String {
    format!("{name}=; Path={path}; HttpOnly; Max-Age=0")
}

async fn login(State(state): State<AppState>, Json(input): Json<LoginRequest>) -> Response {
    let mut sessions = state.sessions.write().await;
    let roles = match sessions.accounts.get(&input.email) {
        None => {
            return (
                StatusCode::NOT_FOUND,
                "No account found with this email address. Please register first.",
            )
                .into_response()
        }
        Some(account) if account.password != input.password => {
            return (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response()
        }
        Some(account) => account
            .roles
            .iter()
            .map(|role| Authority {
                authority: role.clone(),
            })
            .collect(),
    };

    let access = Uuid::new_v4().to_string();
    let refresh = Uuid::new_v4().to_string();
    sessions.access.insert(access.clone(), input.email.clone());
    sessions.refresh.insert(refresh.clone(), input.email.clone());
    drop(sessions);

    tracing::info!(email = %input.email, "login succeeded");
    (
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, access_cookie(&access)),
            (SET_COOKIE, refresh_cookie(&refresh)),
        ]),
        Json(LoginResponse {
            message: "Login successful".to_string(),
            email: input.email,
            roles,
        }),
    )
        .into_response()
}

async fn register(State(state): State<AppState>, Json(input): Json<RegisterRequest>) -> Response {
    if input.phone_number.len() != 10 || !input.phone_number.bytes().all(|b| b.is_ascii_digit()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Phone number must be 10 digits." })),
        )
            .into_response();
    }

    let mut sessions = state.sessions.write().await;
    if sessions.accounts.contains_key(&input.email) {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "An account with this email already exists. Please sign in or use another email address."
            })),
        )
            .into_response();
    }
    let role = format!("ROLE_{}", input.role_type.to_uppercase());
    sessions.accounts.insert(
        input.email.clone(),
        Account {
            password: input.password,
            roles: vec![role],
        },
    );
    drop(sessions);

    tracing::info!(email = %input.email, "account registered");
    (
        StatusCode::OK,
        Json(json!({
            "message": "Registration successful. Please check your email for verification."
        })),
    )
        .into_response()
}

async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ChangePasswordRequest>,
) -> Response {
    let email = match state.authenticate(&headers).await {
        Ok(email) => email,
        Err(rejection) => return rejection.into_response(),
    };

    let mut sessions = state.sessions.write().await;
    let Some(account) = sessions.accounts.get_mut(&email) else {
        return (StatusCode::BAD_REQUEST, "Error changing password: User not found").into_response();
    };
    if account.password != input.current_password {
        return (
            StatusCode::BAD_REQUEST,
            "Error changing password: Current password is incorrect",
        )
            .into_response();
    }
    if input.new_password.len() < 8 {
        return (
            StatusCode::BAD_REQUEST,
            "Error changing password: Password must be at least 8 characters long",
        )
            .into_response();
    }
    account.password = input.new_password;
    drop(sessions);

    tracing::info!(%email, "password changed");
    (StatusCode::OK, "Password changed successfully").into_response()
}

async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CurrentUser>, (StatusCode, &'static str)> {
    let email = state.authenticate(&headers).await?;
    let roles = state
        .sessions
        .read()
        .await
        .accounts
        .get(&email)
        .map(|account| account.roles.clone())
        .unwrap_or_default();
    Ok(Json(CurrentUser { email, roles }))
}

async fn refresh_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let call = state.stats.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let released = state.stats.refresh_released.notified();
    let mut released = std::pin::pin!(released);
    released.as_mut().enable();
    if state.stats.refresh_held.load(Ordering::SeqCst) {
        released.await;
    }

    let delay = state.stats.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let Some(token) = cookie(&headers, REFRESH_COOKIE) else {
        tracing::warn!(call, "refresh without refresh token");
        return (StatusCode::UNAUTHORIZED, "No refresh token found").into_response();
    };

    let mut sessions = state.sessions.write().await;
    let Some(email) = sessions.refresh.get(&token).cloned() else {
        tracing::warn!(call, "refresh with unknown refresh token");
        return (StatusCode::UNAUTHORIZED, "Invalid refresh token").into_response();
    };
    let access = Uuid::new_v4().to_string();
    sessions.access.insert(access.clone(), email.clone());
    drop(sessions);

    tracing::info!(call, %email, "access token refreshed");
    (
        StatusCode::OK,
        [(SET_COOKIE, access_cookie(&access))],
        "Token refreshed successfully",
    )
        .into_response()
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut sessions = state.sessions.write().await;
    if let Some(token) = cookie(&headers, ACCESS_COOKIE) {
        if let Some(email) = sessions.access.remove(&token) {
            sessions.refresh.retain(|_, owner| *owner != email);
            tracing::info!(%email, "logged out");
        }
    }
    drop(sessions);

    (
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, expired_cookie(ACCESS_COOKIE, "/")),
            (SET_COOKIE, expired_cookie(REFRESH_COOKIE, REFRESH_PATH)),
        ]),
        "Logged out successfully",
    )
        .into_response()
}

async fn protected(
    state: &AppState,
    headers: &HeaderMap,
    resource: &str,
) -> Result<Json<Resource>, (StatusCode, &'static str)> {
    let owner = state.authenticate(headers).await?;
    Ok(Json(Resource {
        resource: resource.to_string(),
        owner,
    }))
}

async fn orders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Resource>, (StatusCode, &'static str)> {
    protected(&state, &headers, "orders").await
}

async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Resource>, (StatusCode, &'static str)> {
    protected(&state, &headers, "profile").await
}

async fn bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Resource>, (StatusCode, &'static str)> {
    protected(&state, &headers, "bookings").await
}

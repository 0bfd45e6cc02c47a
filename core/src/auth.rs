//! Authentication endpoints.
//!
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`, plus
//! an async helper that runs the round-trip. Login and registration go
//! straight to the transport: a 401 there means bad credentials, not an
//! expired session. Everything else goes through `send` and is replayed
//! after a renewal.

use tracing::info;

use crate::client::{check_status, parse_json, ApiClient};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    ChangePasswordRequest, CurrentUser, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const CURRENT_USER_PATH: &str = "/auth/me";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const REGISTER_PATH: &str = "/auth/register";
pub const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";

impl ApiClient {
    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        let mut request = self.build_json_request(HttpMethod::Post, LOGIN_PATH, input)?;
        // The session cookies arrive on this response.
        request.with_credentials = true;
        Ok(request)
    }

    pub fn build_current_user(&self) -> HttpRequest {
        self.build_request(HttpMethod::Get, CURRENT_USER_PATH)
    }

    pub fn build_logout(&self) -> HttpRequest {
        self.build_request(HttpMethod::Post, LOGOUT_PATH)
    }

    pub fn build_register(&self, input: &RegisterRequest) -> Result<HttpRequest, ApiError> {
        self.build_json_request(HttpMethod::Post, REGISTER_PATH, input)
    }

    pub fn build_change_password(&self, input: &ChangePasswordRequest) -> Result<HttpRequest, ApiError> {
        self.build_json_request(HttpMethod::Post, CHANGE_PASSWORD_PATH, input)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<LoginResponse, ApiError> {
        let response = check_status(response, 200)?;
        parse_json(&response)
    }

    pub fn parse_current_user(&self, response: HttpResponse) -> Result<CurrentUser, ApiError> {
        let response = check_status(response, 200)?;
        parse_json(&response)
    }

    pub fn parse_logout(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(response, 200)?;
        Ok(())
    }

    /// 409 means the email is taken; the body carries the reason.
    pub fn parse_register(&self, response: HttpResponse) -> Result<RegisterResponse, ApiError> {
        let response = check_status(response, 200)?;
        parse_json(&response)
    }

    pub fn parse_change_password(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(response, 200)?;
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let input = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = self.build_login(&input)?;
        let response = self.transport_send(&request).await?;
        let login = self.parse_login(response)?;
        info!(email = %login.email, "logged in");
        Ok(login)
    }

    pub async fn register(&self, input: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        let request = self.build_register(input)?;
        let response = self.transport_send(&request).await?;
        let registered = self.parse_register(response)?;
        info!(email = %input.email, "registered");
        Ok(registered)
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<(), ApiError> {
        let input = ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        let response = self.send(self.build_change_password(&input)?).await?;
        self.parse_change_password(response)
    }

    pub async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        let response = self.send(self.build_current_user()).await?;
        self.parse_current_user(response)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self.send(self.build_logout()).await?;
        self.parse_logout(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::navigation::LogNavigator;
    use crate::transport::Transport;
    use crate::types::Authority;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            Err(ApiError::Transport("connection refused".to_string()))
        }
    }

    fn client() -> ApiClient {
        ApiClient::new(
            ClientConfig::new("http://localhost:8080/api").with_credentials(false),
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
    fn build_login_produces_correct_request() {
        let input = LoginRequest {
            email: "customer@example.com".to_string(),
            password: "password123".to_string(),
        };
        let req = client().build_login(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:8080/api/auth/login");
        assert!(req.with_credentials);
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["email"], "customer@example.com");
        assert_eq!(body["password"], "password123");
    }

    #[test]
    fn build_current_user_and_logout() {
        let c = client();
        let me = c.build_current_user();
        assert_eq!(me.method, HttpMethod::Get);
        assert_eq!(me.path, "http://localhost:8080/api/auth/me");

        let logout = c.build_logout();
        assert_eq!(logout.method, HttpMethod::Post);
        assert_eq!(logout.path, "http://localhost:8080/api/auth/logout");
        assert!(logout.body.is_none());
    }

    #[test]
    fn parse_login_reads_authority_objects() {
        let login = client()
            .parse_login(response(
                200,
                r#"{"message":"Login successful","email":"customer@example.com","roles":[{"authority":"ROLE_CUSTOMER"}]}"#,
            ))
            .unwrap();
        assert_eq!(login.email, "customer@example.com");
        assert_eq!(
            login.roles,
            vec![Authority {
                authority: "ROLE_CUSTOMER".to_string()
            }]
        );
        assert!(login.has_role("ROLE_CUSTOMER"));
        assert!(!login.has_role("ROLE_VENDOR"));
    }

    #[test]
    fn parse_login_rejects_plain_role_strings() {
        let err = client()
            .parse_login(response(
                200,
                r#"{"message":"Login successful","email":"vendor@example.com","roles":["ROLE_VENDOR"]}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn build_register_uses_camel_case_fields() {
        let input = RegisterRequest {
            name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            phone_number: "0123456789".to_string(),
            email: "ada@example.com".to_string(),
            password: "password123".to_string(),
            pic_url: None,
            role_type: "CUSTOMER".to_string(),
        };
        let req = client().build_register(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:8080/api/auth/register");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["phoneNumber"], "0123456789");
        assert_eq!(body["roleType"], "CUSTOMER");
        assert!(body.get("picUrl").is_none());
    }

    #[test]
    fn parse_register_conflict() {
        let err = client()
            .parse_register(response(
                409,
                r#"{"error":"An account with this email already exists."}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 409, .. }));
    }

    #[test]
    fn build_change_password_request() {
        let input = ChangePasswordRequest {
            current_password: "password123".to_string(),
            new_password: "correct-horse".to_string(),
        };
        let req = client().build_change_password(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:8080/api/auth/change-password");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["currentPassword"], "password123");
        assert_eq!(body["newPassword"], "correct-horse");
    }

    #[test]
    fn parse_change_password_wrong_current_password() {
        let err = client()
            .parse_change_password(response(
                400,
                "Error changing password: Current password is incorrect",
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 400, .. }));
    }

    #[test]
    fn parse_login_bad_credentials() {
        let err = client()
            .parse_login(response(401, "Invalid email or password"))
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn parse_current_user_defaults_roles() {
        let user = client()
            .parse_current_user(response(200, r#"{"email":"customer@example.com"}"#))
            .unwrap();
        assert!(user.roles.is_empty());
    }

    #[test]
    fn parse_logout_unknown_status() {
        let err = client().parse_logout(response(500, "Logout failed")).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, .. }));
    }
}

//! DTOs for the authentication endpoints.
//!
//! # Design
//! These mirror the mock server's schema but are defined independently.
//! The live integration tests catch any drift between the two crates.

use serde::{Deserialize, Serialize};

/// Credentials posted to the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// One granted role as the login endpoint reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Authority {
    pub authority: String,
}

/// Body returned by a successful login. Roles arrive as authority objects,
/// unlike `CurrentUser`, which lists them as plain strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub message: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Authority>,
}

impl LoginResponse {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.authority == role)
    }
}

/// The account behind the current session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// New account details. `role_type` is the bare role name, e.g. `CUSTOMER`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub surname: String,
    /// Ten digits.
    pub phone_number: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pic_url: Option<String>,
    pub role_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Account management system
///
/// Handles user creation, authentication, sessions and service flags.

mod manager;
pub mod password;

pub use manager::AccountManager;

use crate::{db::account::User, services::{ServiceFlags, ServiceUpdate}};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User creation request (admin only)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub services: ServiceUpdate,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

/// User as exposed over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub services: ServiceFlags,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
            email: user.email.clone(),
            is_active: user.is_active,
            is_staff: user.is_staff,
            services: ServiceFlags::from(user),
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}

/// Validated session from a bearer token or session cookie
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub user_id: i64,
    pub session_id: String,
}

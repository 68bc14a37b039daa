//! User model - back-office accounts with their pending reset credential.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Role, UnknownRole};

/// User entity as stored in the `users` table.
///
/// `reset_token` and `otp_code` hold SHA-256 digests, never the values that
/// were sent to the user.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role_code: String,
    pub is_active: bool,
    pub reset_token: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub otp_code: Option<String>,
    pub otp_expires: Option<DateTime<Utc>>,
    /// Wrong codes presented against the outstanding OTP.
    pub otp_attempts: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create a new active user with no pending reset.
    pub fn new(email: String, phone: Option<String>, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email,
            phone,
            password_hash,
            role_code: role.as_str().to_string(),
            is_active: true,
            reset_token: None,
            reset_token_expires: None,
            otp_code: None,
            otp_expires: None,
            otp_attempts: 0,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn role(&self) -> Result<Role, UnknownRole> {
        self.role_code.parse()
    }

    /// True when neither reset flow has anything stored.
    pub fn has_no_reset_artifacts(&self) -> bool {
        self.reset_token.is_none()
            && self.reset_token_expires.is_none()
            && self.otp_code.is_none()
            && self.otp_expires.is_none()
            && self.otp_attempts == 0
    }

    /// Convert to sanitized response (no hash, no reset fields).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        let role = u
            .role()
            .map(|r| r.as_str().to_string())
            .unwrap_or(u.role_code);
        Self {
            user_id: u.user_id,
            email: u.email,
            phone: u.phone,
            role,
            is_active: u.is_active,
            created_utc: u.created_utc,
        }
    }
}

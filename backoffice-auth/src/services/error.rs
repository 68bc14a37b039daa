use service_core::error::AppError;
use thiserror::Error;

/// Message for every failed reset consumption. Unknown, expired, consumed and
/// superseded credentials are indistinguishable to the caller.
pub const INVALID_RESET_CREDENTIAL: &str = "Invalid or expired token";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] AppError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidResetCredential,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(e) => e,
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::InvalidResetCredential => {
                AppError::BadRequest(anyhow::anyhow!(INVALID_RESET_CREDENTIAL))
            }
            e @ ServiceError::WeakPassword(_) => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            ServiceError::IncorrectCurrentPassword => {
                AppError::BadRequest(anyhow::anyhow!("Current password is incorrect"))
            }
            ServiceError::EmailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}

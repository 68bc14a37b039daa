use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::auth::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest},
    services::ResetSubmission,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Same body whether or not the identifier belongs to an account.
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account matches, reset instructions have been sent";

pub const RESET_PASSWORD_MESSAGE: &str = "Password has been reset successfully";

/// Request a password reset token (email) or code (SMS)
#[utoipa::path(
    post,
    path = "/password/forgot",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "Missing or invalid method or identifier", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Password Recovery"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .recovery
        .request_reset(req.method, &req.identifier)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, channel = req.method.as_str(), "Failed to process password reset request");
            AppError::from(e)
        })?;

    Ok((StatusCode::OK, Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE))))
}

/// Set a new password with a reset token, or an OTP plus phone number
#[utoipa::path(
    post,
    path = "/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset successful", body = MessageResponse),
        (status = 400, description = "Weak password or invalid or expired token", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Password Recovery"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = ResetSubmission {
        token: req.token,
        otp: req.otp,
        identifier: req.identifier,
        new_password: Password::new(req.new_password),
    };

    state.recovery.consume_reset(submission).await?;

    Ok((StatusCode::OK, Json(MessageResponse::new(RESET_PASSWORD_MESSAGE))))
}

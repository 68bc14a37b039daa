use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::auth::{ChangePasswordRequest, MessageResponse},
    middleware::{authorize, RequestContext, ANY_ROLE},
    utils::{Password, ValidatedJson},
    AppState,
};

/// Get current user profile
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn get_me(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    let session = authorize(&ctx, ANY_ROLE)?;
    let user = state.accounts.profile(session.user_id).await?;
    Ok(Json(user.sanitized()))
}

/// Change password
#[utoipa::path(
    post,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Weak password or wrong current password", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn change_password(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = authorize(&ctx, ANY_ROLE)?;

    state
        .accounts
        .change_password(
            session.user_id,
            &Password::new(req.current_password),
            &Password::new(req.new_password),
        )
        .await?;

    Ok((StatusCode::OK, Json(MessageResponse::new("Password changed successfully"))))
}

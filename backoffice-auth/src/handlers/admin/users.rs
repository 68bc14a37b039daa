use service_core::{
    axum::{
        extract::{Path, State},
        http::StatusCode,
        response::IntoResponse,
        Json,
    },
    error::AppError,
};
use uuid::Uuid;

use crate::{
    dtos::admin::{CreateUserRequest, SetUserStatusRequest},
    middleware::{authorize, RequestContext, ADMINS, SUPER_ADMIN_ONLY},
    models::UserResponse,
    services::NewUser,
    utils::{Password, ValidatedJson},
    AppState,
};

/// List back-office users
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    authorize(&ctx, ADMINS)?;

    let users: Vec<UserResponse> = state
        .accounts
        .list_users()
        .await?
        .iter()
        .map(|u| u.sanitized())
        .collect();

    Ok(Json(users))
}

/// Provision a user with a role
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = authorize(&ctx, SUPER_ADMIN_ONLY)?;

    let user = state
        .accounts
        .provision_user(NewUser {
            email: req.email,
            phone: req.phone,
            password: Password::new(req.password),
            role: req.role,
        })
        .await?;

    tracing::info!(
        actor = %session.user_id,
        user_id = %user.user_id,
        "Super admin provisioned user"
    );

    Ok((StatusCode::CREATED, Json(user.sanitized())))
}

/// Activate or deactivate a user
#[utoipa::path(
    patch,
    path = "/admin/users/{user_id}/status",
    request_body = SetUserStatusRequest,
    params(
        ("user_id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn set_user_status(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SetUserStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&ctx, SUPER_ADMIN_ONLY)?;

    let user = state.accounts.set_active(user_id, req.active).await?;
    Ok(Json(user.sanitized()))
}

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Role;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "cashier@shop.example")]
    pub email: String,

    #[schema(example = "+15551234567")]
    pub phone: Option<String>,

    #[schema(example = "initial-password")]
    pub password: String,

    pub role: Role,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetUserStatusRequest {
    #[schema(example = false)]
    pub active: bool,
}

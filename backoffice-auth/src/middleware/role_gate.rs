//! Role gate: per-route allow/deny over the request's session.
//!
//! Each route lists the roles it accepts. Membership is exact, so a route
//! that accepts only `SUPER_ADMIN` rejects `ADMIN`.

use service_core::error::AppError;
use thiserror::Error;

use super::session::RequestContext;
use crate::models::Role;
use crate::services::Session;

pub const ANY_ROLE: &[Role] = &[Role::SuperAdmin, Role::Admin, Role::User];
pub const ADMINS: &[Role] = &[Role::SuperAdmin, Role::Admin];
pub const SUPER_ADMIN_ONLY: &[Role] = &[Role::SuperAdmin];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Unauthorized => AppError::Unauthorized(anyhow::anyhow!("Unauthorized")),
            GateError::Forbidden => AppError::Forbidden(anyhow::anyhow!("Forbidden")),
        }
    }
}

/// Allow the request when it carries a session whose role is in `accepted`.
pub fn authorize<'a>(ctx: &'a RequestContext, accepted: &[Role]) -> Result<&'a Session, GateError> {
    let session = ctx.session.as_ref().ok_or(GateError::Unauthorized)?;
    if accepted.contains(&session.role) {
        Ok(session)
    } else {
        tracing::info!(
            user_id = %session.user_id,
            role = %session.role,
            "Role gate denied request"
        );
        Err(GateError::Forbidden)
    }
}

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;

use crate::{
    services::{CredentialStore, Session},
    AppState,
};

/// Per-request view of who is calling. `session` is `None` for anonymous or
/// unresolvable callers; the role gate decides what that means per route.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session: Option<Session>,
}

/// Resolve `Authorization: Bearer <token>` into a `RequestContext` stored in
/// request extensions. The session only survives while its user exists and
/// is active, so deactivation takes effect on the next request. Never
/// rejects on its own; a store failure is a 500.
pub async fn session_context_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.sessions.resolve(token.trim()));

    let session = match session {
        Some(session) => match state.store.find_user_by_id(session.user_id).await {
            Ok(Some(user)) if user.is_active => Some(session),
            Ok(_) => {
                tracing::info!(
                    user_id = %session.user_id,
                    "Session dropped for missing or inactive user"
                );
                None
            }
            Err(e) => return e.into_response(),
        },
        None => None,
    };

    req.extensions_mut().insert(RequestContext { session });
    next.run(req).await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}

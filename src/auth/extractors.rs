use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{
    actor::{Actor, Member},
    error::AuthError,
    jwt::JwtKeys,
};
use crate::state::AppState;

/// No `Authorization` header means anonymous; a bad bearer token is rejected
/// outright rather than silently downgraded.
#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
            return Ok(Actor::Anonymous);
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .ok_or(AuthError::Unauthenticated)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "invalid or expired access token");
            AuthError::Unauthenticated
        })?;

        let mut user = state
            .store
            .user_by_id(claims.sub)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        user.ping();
        if let Err(e) = state.store.touch_last_seen(user.id, user.last_seen).await {
            warn!(error = %e, user_id = %user.id, "failed to record last_seen");
        }

        let role = match user.role_id {
            Some(role_id) => state.store.role_by_id(role_id).await?,
            None => None,
        };

        Ok(Actor::Authenticated(Member { user, role }))
    }
}

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{AdminEditRequest, AdminUserResponse, EditProfileRequest, ProfileResponse, RoleResponse},
    permissions::Permission,
    repo_types::{Role, User},
    services,
};
use crate::{
    auth::{actor::Actor, error::AuthError},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:username", get(get_profile))
        .route("/me/profile", put(edit_profile))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users/:id", put(admin_edit_user))
        .route("/admin/roles", get(list_roles))
}

async fn role_of(state: &AppState, user: &User) -> Result<Option<Role>, AuthError> {
    Ok(match user.role_id {
        Some(id) => state.store.role_by_id(id).await?,
        None => None,
    })
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AuthError> {
    let user = state
        .store
        .user_by_username(&username)
        .await?
        .ok_or(AuthError::NotFound("user"))?;
    let role = role_of(&state, &user).await?;
    Ok(Json(ProfileResponse::new(&user, role.as_ref())))
}

#[instrument(skip(state, actor, payload))]
pub async fn edit_profile(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<EditProfileRequest>,
) -> Result<Json<ProfileResponse>, AuthError> {
    actor.require_confirmed()?;
    let mut member = actor.into_member()?;
    services::edit_profile(state.store.as_ref(), &mut member.user, &payload).await?;
    Ok(Json(ProfileResponse::new(&member.user, member.role.as_ref())))
}

#[instrument(skip(state, actor, payload))]
pub async fn admin_edit_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminEditRequest>,
) -> Result<Json<AdminUserResponse>, AuthError> {
    actor.require(Permission::ADMINISTER)?;
    actor.require_confirmed()?;
    let user = services::admin_edit(state.store.as_ref(), id, &payload).await?;
    let role = role_of(&state, &user).await?;
    Ok(Json(AdminUserResponse {
        email: user.email.clone(),
        confirmed: user.confirmed,
        role_id: user.role_id,
        profile: ProfileResponse::new(&user, role.as_ref()),
    }))
}

#[instrument(skip(state, actor))]
pub async fn list_roles(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<RoleResponse>>, AuthError> {
    actor.require(Permission::ADMINISTER)?;
    actor.require_confirmed()?;
    let roles = state.store.list_roles().await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{Pagination, PostRequest},
    repo_types::Post,
};
use crate::{
    auth::{actor::Actor, error::AuthError},
    state::AppState,
    users::permissions::Permission,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/:id", get(get_post).put(edit_post))
        .route("/users/:username/posts", get(list_user_posts))
}

fn check_body(body: &str) -> Result<&str, AuthError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AuthError::validation("Post body is required."));
    }
    Ok(body)
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Post>>, AuthError> {
    let (limit, offset) = p.clamped();
    Ok(Json(state.store.recent_posts(limit, offset).await?))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, AuthError> {
    let post = state
        .store
        .post_by_id(id)
        .await?
        .ok_or(AuthError::NotFound("post"))?;
    Ok(Json(post))
}

#[instrument(skip(state))]
pub async fn list_user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Post>>, AuthError> {
    let author = state
        .store
        .user_by_username(&username)
        .await?
        .ok_or(AuthError::NotFound("user"))?;
    let (limit, offset) = p.clamped();
    Ok(Json(state.store.posts_by_author(author.id, limit, offset).await?))
}

/// Confirmed members holding WRITE_ARTICLES only.
#[instrument(skip(state, actor, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<PostRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Post>), AuthError> {
    let member = actor.require(Permission::WRITE_ARTICLES)?;
    actor.require_confirmed()?;
    let post = Post::new(member.user.id, check_body(&payload.body)?);
    state.store.save_post(&post).await?;
    info!(post_id = %post.id, author_id = %post.author_id, "post created");

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/api/v1/posts/{}", post.id))
        .map_err(|e| AuthError::Internal(e.into()))?;
    headers.insert(LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(post)))
}

/// The author or an administrator may edit.
#[instrument(skip(state, actor, payload))]
pub async fn edit_post(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<PostRequest>,
) -> Result<Json<Post>, AuthError> {
    let member = actor.require_confirmed()?;
    let mut post = state
        .store
        .post_by_id(id)
        .await?
        .ok_or(AuthError::NotFound("post"))?;

    if post.author_id != member.user.id && !member.is_administrator() {
        warn!(post_id = %post.id, user_id = %member.user.id, "edit of someone else's post");
        return Err(AuthError::Forbidden);
    }

    post.body = check_body(&payload.body)?.to_string();
    state.store.save_post(&post).await?;
    info!(post_id = %post.id, "post updated");
    Ok(Json(post))
}

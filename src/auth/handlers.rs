use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    actor::Actor,
    dto::{
        AuthResponse, ChangePasswordRequest, ConfirmationStatus, LoginRequest, MessageResponse,
        PasswordResetForm, PasswordResetRequest, PublicUser, RefreshRequest, RegisterRequest,
        RegisterResponse,
    },
    error::AuthError,
    jwt::JwtKeys,
    services::{AccountService, ConfirmOutcome},
};
use crate::{state::AppState, users::repo_types::User};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/confirm", post(resend_confirmation))
        .route("/auth/confirm/:token", get(confirm))
        .route("/auth/unconfirmed", get(unconfirmed))
        .route("/auth/change-password", post(change_password))
        .route("/auth/reset", post(request_password_reset))
        .route("/auth/reset/:token", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn issue_tokens(state: &AppState, user: &User, remember: bool) -> Result<AuthResponse, AuthError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = if remember {
        Some(keys.sign_refresh(user.id)?)
    } else {
        None
    };
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let user = AccountService::new(&state).register(&payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: PublicUser::from(&user),
            message: "A confirmation email has been sent to you by email.",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let user = AccountService::new(&state)
        .authenticate(&payload.email, &payload.password)
        .await?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(issue_tokens(&state, &user, payload.remember_me)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AuthError::Unauthenticated
    })?;
    let user = state
        .store
        .user_by_id(claims.sub)
        .await?
        .ok_or(AuthError::Unauthenticated)?;
    Ok(Json(issue_tokens(&state, &user, true)?))
}

#[instrument(skip(state, actor, token))]
pub async fn confirm(
    State(state): State<AppState>,
    actor: Actor,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AuthError> {
    let mut member = actor.into_member()?;
    let message = match AccountService::new(&state).confirm(&mut member.user, &token).await? {
        ConfirmOutcome::Confirmed => "You have confirmed your account. Thanks!",
        ConfirmOutcome::AlreadyConfirmed => "Your account is already confirmed.",
    };
    Ok(Json(MessageResponse { message }))
}

#[instrument(skip(state, actor))]
pub async fn resend_confirmation(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<MessageResponse>, AuthError> {
    let member = actor.member()?;
    if member.user.confirmed {
        return Ok(Json(MessageResponse {
            message: "Your account is already confirmed.",
        }));
    }
    AccountService::new(&state).send_confirmation(&member.user)?;
    Ok(Json(MessageResponse {
        message: "A new confirmation email has been sent to you by email.",
    }))
}

#[instrument(skip(actor))]
pub async fn unconfirmed(actor: Actor) -> Result<Json<ConfirmationStatus>, AuthError> {
    let member = actor.member()?;
    Ok(Json(ConfirmationStatus {
        confirmed: member.user.confirmed,
    }))
}

#[instrument(skip(state, actor, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let mut member = actor.into_member()?;
    AccountService::new(&state)
        .change_password(&mut member.user, &payload)
        .await?;
    Ok(Json(MessageResponse {
        message: "Your password has been updated.",
    }))
}

/// Only for signed-out visitors.
#[instrument(skip(state, actor, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    if actor.is_authenticated() {
        return Err(AuthError::Forbidden);
    }
    AccountService::new(&state)
        .request_password_reset(&payload.email)
        .await?;
    Ok(Json(MessageResponse {
        message: "An email with instructions to reset your password has been sent to you.",
    }))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<PasswordResetForm>,
) -> Result<Json<MessageResponse>, AuthError> {
    AccountService::new(&state)
        .reset_password(&token, &payload)
        .await?;
    Ok(Json(MessageResponse {
        message: "Your password has been updated.",
    }))
}

#[instrument(skip(actor))]
pub async fn get_me(actor: Actor) -> Result<Json<PublicUser>, AuthError> {
    let member = actor.member()?;
    Ok(Json(PublicUser::from(&member.user)))
}

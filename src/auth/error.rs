use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::storage::UniqueViolation;

/// Unique user fields checked on registration and profile edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::Username => f.write_str("username"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token is malformed or its signature does not match")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("token was issued for a different intent")]
    IntentMismatch,

    #[error("token subject does not match the acting user")]
    SubjectMismatch,

    #[error("token subject no longer exists")]
    UnknownSubject,

    /// `editing` is set when an existing account was being changed rather
    /// than a new one registered; the two report a taken username differently.
    #[error("{field} is already taken")]
    DuplicateUnique { field: UniqueField, editing: bool },

    #[error("{0} is not a readable attribute")]
    AttributeAccessDenied(&'static str),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthenticated,

    #[error("permission denied")]
    Forbidden,

    #[error("account not confirmed")]
    Unconfirmed,

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Internal(anyhow::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Store errors carrying a unique-field clash stay recoverable.
impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<UniqueViolation>() {
            Some(clash) => AuthError::DuplicateUnique {
                field: clash.field,
                editing: false,
            },
            None => AuthError::Internal(e),
        }
    }
}

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn while_editing(self) -> Self {
        match self {
            AuthError::DuplicateUnique { field, .. } => AuthError::DuplicateUnique {
                field,
                editing: true,
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Invalid
            | AuthError::Expired
            | AuthError::IntentMismatch
            | AuthError::SubjectMismatch
            | AuthError::UnknownSubject
            | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::DuplicateUnique { .. } => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden | AuthError::Unconfirmed => StatusCode::FORBIDDEN,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::AttributeAccessDenied(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to clients. Token failures collapse into one notice so a
    /// caller cannot tell an expired link from a forged one.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Invalid
            | AuthError::Expired
            | AuthError::IntentMismatch
            | AuthError::SubjectMismatch
            | AuthError::UnknownSubject => "The link is invalid or has expired.".into(),
            AuthError::DuplicateUnique {
                field: UniqueField::Email,
                ..
            } => "Email already registered.".into(),
            AuthError::DuplicateUnique {
                field: UniqueField::Username,
                editing: false,
            } => "Username already in use.".into(),
            AuthError::DuplicateUnique {
                field: UniqueField::Username,
                editing: true,
            } => "Username already registered.".into(),
            AuthError::InvalidCredentials => "Invalid credentials".into(),
            AuthError::Unauthenticated => "Authentication required".into(),
            AuthError::Forbidden => "Forbidden".into(),
            AuthError::Unconfirmed => "Account not confirmed".into(),
            AuthError::Validation(msg) => msg.clone(),
            AuthError::NotFound(what) => format!("{what} not found"),
            AuthError::AttributeAccessDenied(_) | AuthError::Internal(_) => {
                "Internal server error".into()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::AttributeAccessDenied(attr) => {
                error!(attribute = *attr, "write-only attribute was read");
            }
            AuthError::Internal(e) => error!(error = %e, "internal error"),
            _ => {}
        }
        (self.status(), self.public_message()).into_response()
    }
}

//! Signed, expiring tokens that bind a user id to one purpose.
//!
//! Tokens are stateless: nothing is stored server-side, so a token stays
//! usable until it expires. Rotating `SECRET_KEY` invalidates every
//! outstanding token.

use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{
    claims::IntentClaims,
    error::{AuthError, AuthResult},
};
use crate::state::AppState;

const INTENT_ISSUER: &str = "scribe-links";

/// What a mailed token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Confirm,
    Reset,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Confirm => "confirm",
            Intent::Reset => "reset",
        }
    }
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    default_ttl: Duration,
}

impl FromRef<AppState> for TokenSigner {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            &state.config.jwt.secret,
            Duration::from_secs(state.config.tokens.ttl_secs),
        )
    }
}

impl TokenSigner {
    pub fn new(secret: &str, default_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            default_ttl,
        }
    }

    pub fn issue(&self, subject: Uuid, intent: Intent, ttl: Duration) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let mut claims = IntentClaims {
            iat: now,
            exp: now.saturating_add(ttl.as_secs() as usize),
            iss: INTENT_ISSUER.into(),
            ..IntentClaims::default()
        };
        match intent {
            Intent::Confirm => claims.confirm = Some(subject),
            Intent::Reset => claims.reset = Some(subject),
        }
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(e.into()))?;
        debug!(user_id = %subject, intent = intent.as_str(), "intent token issued");
        Ok(token)
    }

    /// Issues with the configured lifetime.
    pub fn issue_default(&self, subject: Uuid, intent: Intent) -> AuthResult<String> {
        self.issue(subject, intent, self.default_ttl)
    }

    /// Returns the embedded subject id. Marking anything as confirmed or
    /// changing a password is left to the caller.
    pub fn verify(&self, token: &str, expected: Intent) -> AuthResult<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[INTENT_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let data = decode::<IntentClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            }
        })?;
        let claims = data.claims;

        let subject = match expected {
            Intent::Confirm => claims.confirm,
            Intent::Reset => claims.reset,
        };
        match subject {
            Some(id) => {
                debug!(user_id = %id, intent = expected.as_str(), "intent token verified");
                Ok(id)
            }
            None if claims.confirm.is_none() && claims.reset.is_none() => Err(AuthError::Invalid),
            None => Err(AuthError::IntentMismatch),
        }
    }
}

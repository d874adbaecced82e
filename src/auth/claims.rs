use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer token flavour: short-lived access or long-lived refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Payload of the bearer tokens that identify the acting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // access or refresh
}

/// Payload of mailed confirm/reset links. Exactly one intent key is set and
/// carries the subject id, e.g. `{"confirm": "<uuid>", ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<Uuid>,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
}

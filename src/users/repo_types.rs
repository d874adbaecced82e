use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    error::{AuthError, AuthResult},
    password::{hash_password, verify_password},
};

/// Role record. `permissions` is a bitmask over [`super::permissions::Permission`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub permissions: i32,
    pub is_default: bool,
}

impl Role {
    pub fn new(name: &str, permissions: i32, is_default: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            permissions,
            is_default,
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    password_hash: String,
    pub confirmed: bool,
    pub role_id: Option<Uuid>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub avatar_hash: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
}

impl User {
    /// Builds an unconfirmed user without a role; the caller assigns one
    /// before saving.
    pub fn new(email: &str, username: &str, password: &str) -> anyhow::Result<Self> {
        let now = OffsetDateTime::now_utc();
        let mut user = Self {
            id: Uuid::new_v4(),
            email: String::new(),
            username: username.to_string(),
            password_hash: hash_password(password)?,
            confirmed: false,
            role_id: None,
            name: None,
            location: None,
            about_me: None,
            avatar_hash: None,
            member_since: now,
            last_seen: now,
        };
        user.set_email(email);
        Ok(user)
    }

    /// The plaintext password is never kept, so reading it is a caller bug.
    pub fn password(&self) -> AuthResult<&str> {
        Err(AuthError::AttributeAccessDenied("password"))
    }

    pub fn set_password(&mut self, plain: &str) -> anyhow::Result<()> {
        self.password_hash = hash_password(plain)?;
        Ok(())
    }

    /// A stored hash that fails to parse counts as a mismatch.
    pub fn verify_password(&self, plain: &str) -> bool {
        verify_password(plain, &self.password_hash).unwrap_or(false)
    }

    pub(crate) fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn set_email(&mut self, email: &str) {
        self.email = email.trim().to_lowercase();
        self.avatar_hash = Some(email_fingerprint(&self.email));
    }

    pub fn ping(&mut self) {
        self.last_seen = OffsetDateTime::now_utc();
    }

    pub fn gravatar(&self, size: u32) -> String {
        let hash = self
            .avatar_hash
            .clone()
            .unwrap_or_else(|| email_fingerprint(&self.email));
        format!("https://secure.gravatar.com/avatar/{hash}?s={size}&d=identicon&r=g")
    }
}

fn email_fingerprint(email: &str) -> String {
    format!("{:x}", Sha256::digest(email.trim().to_lowercase().as_bytes()))
}

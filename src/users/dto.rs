use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Role, User};

#[derive(Debug, Deserialize)]
pub struct EditProfileRequest {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub about_me: String,
}

/// Every field is optional; only the ones present are changed.
#[derive(Debug, Default, Deserialize)]
pub struct AdminEditRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub confirmed: Option<bool>,
    pub role_id: Option<Uuid>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub avatar_url: String,
    pub role: Option<String>,
}

impl ProfileResponse {
    pub fn new(user: &User, role: Option<&Role>) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            location: user.location.clone(),
            about_me: user.about_me.clone(),
            member_since: user.member_since,
            last_seen: user.last_seen,
            avatar_url: user.gravatar(256),
            role: role.map(|r| r.name.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub permissions: i32,
    pub is_default: bool,
}

impl From<Role> for RoleResponse {
    fn from(r: Role) -> Self {
        Self {
            id: r.id,
            name: r.name,
            permissions: r.permissions,
            is_default: r.is_default,
        }
    }
}

/// What administrators see after an edit: the profile plus account fields.
#[derive(Debug, Serialize)]
pub struct AdminUserResponse {
    pub email: String,
    pub confirmed: bool,
    pub role_id: Option<Uuid>,
    #[serde(flatten)]
    pub profile: ProfileResponse,
}

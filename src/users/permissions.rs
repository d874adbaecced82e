//! Bitmask permissions and the fixed role table.

use tracing::info;

use super::repo_types::Role;
use crate::storage::RoleStore;

/// Permission bits. A role holds a permission iff its bit is set.
pub struct Permission;

impl Permission {
    pub const FOLLOW: i32 = 0x01;
    pub const COMMENT: i32 = 0x02;
    pub const WRITE_ARTICLES: i32 = 0x04;
    pub const MODERATE_COMMENTS: i32 = 0x08;
    pub const ADMINISTER: i32 = 0x80;
}

/// `true` iff a role is present and carries every requested bit. A missing
/// role (anonymous actor, or a user whose role was never assigned) is
/// refused everything, including the empty mask.
pub fn can(role: Option<&Role>, bits: i32) -> bool {
    match role {
        Some(role) => role.permissions & bits == bits,
        None => false,
    }
}

pub struct RoleDefinition {
    pub name: &'static str,
    pub permissions: i32,
    pub is_default: bool,
}

pub const USER_ROLE: &str = "User";
pub const MODERATOR_ROLE: &str = "Moderator";
pub const ADMINISTRATOR_ROLE: &str = "Administrator";

/// Exactly one entry is the default role.
pub const ROLE_TABLE: [RoleDefinition; 3] = [
    RoleDefinition {
        name: USER_ROLE,
        permissions: Permission::FOLLOW | Permission::COMMENT | Permission::WRITE_ARTICLES,
        is_default: true,
    },
    RoleDefinition {
        name: MODERATOR_ROLE,
        permissions: Permission::FOLLOW
            | Permission::COMMENT
            | Permission::WRITE_ARTICLES
            | Permission::MODERATE_COMMENTS,
        is_default: false,
    },
    RoleDefinition {
        name: ADMINISTRATOR_ROLE,
        permissions: 0xff,
        is_default: false,
    },
];

/// Creates the fixed roles or resets existing ones to their canonical bits
/// and default flag. Repeated runs never duplicate a role. Two processes
/// running this at once may race; run it from one maintenance step.
pub async fn bootstrap_roles<S>(store: &S) -> anyhow::Result<Vec<Role>>
where
    S: RoleStore + ?Sized,
{
    let mut roles = Vec::with_capacity(ROLE_TABLE.len());
    for def in &ROLE_TABLE {
        let role = match store.role_by_name(def.name).await? {
            Some(mut existing) => {
                existing.permissions = def.permissions;
                existing.is_default = def.is_default;
                existing
            }
            None => {
                info!(role = def.name, "creating role");
                Role::new(def.name, def.permissions, def.is_default)
            }
        };
        store.save_role(&role).await?;
        roles.push(role);
    }
    info!(count = roles.len(), "roles bootstrapped");
    Ok(roles)
}

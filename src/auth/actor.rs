use crate::users::{
    permissions::{can, Permission},
    repo_types::{Role, User},
};

use super::error::{AuthError, AuthResult};

/// A signed-in user together with their resolved role.
#[derive(Debug, Clone)]
pub struct Member {
    pub user: User,
    pub role: Option<Role>,
}

impl Member {
    pub fn can(&self, bits: i32) -> bool {
        can(self.role.as_ref(), bits)
    }

    pub fn is_administrator(&self) -> bool {
        self.can(Permission::ADMINISTER)
    }
}

/// Whoever is making the request. Passed explicitly to every check.
#[derive(Debug, Clone)]
pub enum Actor {
    Authenticated(Member),
    Anonymous,
}

impl Actor {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::Authenticated(_))
    }

    pub fn is_anonymous(&self) -> bool {
        !self.is_authenticated()
    }

    pub fn can(&self, bits: i32) -> bool {
        match self {
            Actor::Authenticated(member) => member.can(bits),
            Actor::Anonymous => false,
        }
    }

    pub fn is_administrator(&self) -> bool {
        self.can(Permission::ADMINISTER)
    }

    pub fn member(&self) -> AuthResult<&Member> {
        match self {
            Actor::Authenticated(member) => Ok(member),
            Actor::Anonymous => Err(AuthError::Unauthenticated),
        }
    }

    pub fn into_member(self) -> AuthResult<Member> {
        match self {
            Actor::Authenticated(member) => Ok(member),
            Actor::Anonymous => Err(AuthError::Unauthenticated),
        }
    }

    pub fn require(&self, bits: i32) -> AuthResult<&Member> {
        let member = self.member()?;
        if member.can(bits) {
            Ok(member)
        } else {
            Err(AuthError::Forbidden)
        }
    }

    pub fn require_confirmed(&self) -> AuthResult<&Member> {
        let member = self.member()?;
        if member.user.confirmed {
            Ok(member)
        } else {
            Err(AuthError::Unconfirmed)
        }
    }
}

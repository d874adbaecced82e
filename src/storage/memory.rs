//! In-process store used when no `DATABASE_URL` is configured and by tests.

use std::collections::HashMap;

use anyhow::bail;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PostStore, RoleStore, UniqueViolation, UserStore};
use crate::{
    auth::error::UniqueField,
    posts::repo_types::Post,
    users::repo_types::{Role, User},
};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    roles: RwLock<HashMap<Uuid, Role>>,
    posts: RwLock<HashMap<Uuid, Post>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T>(mut rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = offset.max(0) as usize;
    let limit = limit.max(0) as usize;
    if offset >= rows.len() {
        return Vec::new();
    }
    rows.drain(..offset);
    rows.truncate(limit);
    rows
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn save_user(&self, user: &User) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        let taken = |same: fn(&User, &User) -> bool| {
            users.values().any(|u| u.id != user.id && same(u, user))
        };
        let field = if taken(|a, b| a.email == b.email) {
            Some(UniqueField::Email)
        } else if taken(|a, b| a.username == b.username) {
            Some(UniqueField::Username)
        } else {
            None
        };
        if let Some(field) = field {
            return Err(UniqueViolation { field }.into());
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn touch_last_seen(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.last_seen = at;
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> anyhow::Result<bool> {
        let removed = self.users.write().await.remove(&id).is_some();
        if removed {
            self.posts.write().await.retain(|_, p| p.author_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn role_by_id(&self, id: Uuid) -> anyhow::Result<Option<Role>> {
        Ok(self.roles.read().await.get(&id).cloned())
    }

    async fn role_by_name(&self, name: &str) -> anyhow::Result<Option<Role>> {
        let roles = self.roles.read().await;
        Ok(roles.values().find(|r| r.name == name).cloned())
    }

    async fn default_role(&self) -> anyhow::Result<Option<Role>> {
        let roles = self.roles.read().await;
        Ok(roles.values().find(|r| r.is_default).cloned())
    }

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.read().await.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn save_role(&self, role: &Role) -> anyhow::Result<()> {
        let mut roles = self.roles.write().await;
        if roles.values().any(|r| r.id != role.id && r.name == role.name) {
            bail!("role name {} already exists", role.name);
        }
        roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.roles.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn post_by_id(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn recent_posts(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Post>> {
        let mut rows: Vec<Post> = self.posts.read().await.values().cloned().collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(page(rows, limit, offset))
    }

    async fn posts_by_author(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>> {
        let mut rows: Vec<Post> = self
            .posts
            .read()
            .await
            .values()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(page(rows, limit, offset))
    }

    async fn save_post(&self, post: &Post) -> anyhow::Result<()> {
        if !self.users.read().await.contains_key(&post.author_id) {
            bail!("post author {} does not exist", post.author_id);
        }
        self.posts.write().await.insert(post.id, post.clone());
        Ok(())
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.posts.write().await.remove(&id).is_some())
    }
}

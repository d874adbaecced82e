//! Persistence seams. Entities reference each other by id; every lookup goes
//! through these traits so the same services run on Postgres or in memory.

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::error::UniqueField,
    posts::repo_types::Post,
    users::repo_types::{Role, User},
};

pub mod memory;

/// A write collided with another row on a unique user field. Stores return it
/// inside `anyhow::Error` so callers can recover it with `downcast_ref`.
#[derive(Debug, thiserror::Error)]
#[error("{field} is already taken")]
pub struct UniqueViolation {
    pub field: UniqueField,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    /// Insert or update by id.
    async fn save_user(&self, user: &User) -> anyhow::Result<()>;
    /// Writes only `last_seen`, leaving every other column as stored.
    async fn touch_last_seen(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()>;
    async fn delete_user(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn role_by_id(&self, id: Uuid) -> anyhow::Result<Option<Role>>;
    async fn role_by_name(&self, name: &str) -> anyhow::Result<Option<Role>>;
    async fn default_role(&self) -> anyhow::Result<Option<Role>>;
    /// Ordered by name.
    async fn list_roles(&self) -> anyhow::Result<Vec<Role>>;
    async fn save_role(&self, role: &Role) -> anyhow::Result<()>;
    async fn delete_role(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn post_by_id(&self, id: Uuid) -> anyhow::Result<Option<Post>>;
    /// Newest first.
    async fn recent_posts(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Post>>;
    /// Newest first.
    async fn posts_by_author(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>>;
    async fn save_post(&self, post: &Post) -> anyhow::Result<()>;
    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool>;
}

pub trait Store: UserStore + RoleStore + PostStore {}

impl<T: UserStore + RoleStore + PostStore> Store for T {}

/// Postgres-backed store. The queries live next to their entities in
/// `users::repo` and `posts::repo`.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

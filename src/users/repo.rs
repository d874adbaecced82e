use anyhow::Context;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::error::UniqueField,
    storage::{PgStore, RoleStore, UniqueViolation, UserStore},
    users::repo_types::{Role, User},
};

/// Unique-constraint failures on `users` become a [`UniqueViolation`] naming
/// the field; anything else keeps its context.
fn user_write_error(e: sqlx::Error) -> anyhow::Error {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(c) if c.contains("username") => UniqueField::Username,
                _ => UniqueField::Email,
            };
            return UniqueViolation { field }.into();
        }
    }
    anyhow::Error::new(e).context("save user")
}

const USER_COLUMNS: &str = "id, email, username, password_hash, confirmed, role_id, name, \
                            location, about_me, avatar_hash, member_since, last_seen";

#[async_trait]
impl UserStore for PgStore {
    async fn user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("load user by id")?;
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.db)
                .await
                .context("load user by email")?;
        Ok(user)
    }

    async fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("load user by username")?;
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password_hash, confirmed, role_id,
                               name, location, about_me, avatar_hash, member_since, last_seen)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                username = EXCLUDED.username,
                password_hash = EXCLUDED.password_hash,
                confirmed = EXCLUDED.confirmed,
                role_id = EXCLUDED.role_id,
                name = EXCLUDED.name,
                location = EXCLUDED.location,
                about_me = EXCLUDED.about_me,
                avatar_hash = EXCLUDED.avatar_hash,
                last_seen = EXCLUDED.last_seen
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(user.password_hash())
        .bind(user.confirmed)
        .bind(user.role_id)
        .bind(&user.name)
        .bind(&user.location)
        .bind(&user.about_me)
        .bind(&user.avatar_hash)
        .bind(user.member_since)
        .bind(user.last_seen)
        .execute(&self.db)
        .await
        .map_err(user_write_error)?;
        Ok(())
    }

    async fn touch_last_seen(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_seen = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await
            .context("touch last_seen")?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn role_by_id(&self, id: Uuid) -> anyhow::Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, permissions, is_default FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("load role by id")?;
        Ok(role)
    }

    async fn role_by_name(&self, name: &str) -> anyhow::Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, permissions, is_default FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .context("load role by name")?;
        Ok(role)
    }

    async fn default_role(&self) -> anyhow::Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, permissions, is_default FROM roles WHERE is_default LIMIT 1",
        )
        .fetch_optional(&self.db)
        .await
        .context("load default role")?;
        Ok(role)
    }

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, permissions, is_default FROM roles ORDER BY name",
        )
        .fetch_all(&self.db)
        .await
        .context("list roles")?;
        Ok(roles)
    }

    async fn save_role(&self, role: &Role) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO roles (id, name, permissions, is_default)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                permissions = EXCLUDED.permissions,
                is_default = EXCLUDED.is_default
            "#,
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(role.permissions)
        .bind(role.is_default)
        .execute(&self.db)
        .await
        .context("save role")?;
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete role")?;
        Ok(res.rows_affected() > 0)
    }
}

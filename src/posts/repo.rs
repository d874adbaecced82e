use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    posts::repo_types::Post,
    storage::{PgStore, PostStore},
};

#[async_trait]
impl PostStore for PgStore {
    async fn post_by_id(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT id, body, timestamp, author_id FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("load post")?;
        Ok(post)
    }

    async fn recent_posts(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, body, timestamp, author_id
            FROM posts
            ORDER BY timestamp DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list recent posts")?;
        Ok(rows)
    }

    async fn posts_by_author(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, body, timestamp, author_id
            FROM posts
            WHERE author_id = $1
            ORDER BY timestamp DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list posts by author")?;
        Ok(rows)
    }

    async fn save_post(&self, post: &Post) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, body, timestamp, author_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET body = EXCLUDED.body
            "#,
        )
        .bind(post.id)
        .bind(&post.body)
        .bind(post.timestamp)
        .bind(post.author_id)
        .execute(&self.db)
        .await
        .context("save post")?;
        Ok(())
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete post")?;
        Ok(res.rows_affected() > 0)
    }
}

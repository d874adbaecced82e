use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Blog post; `author_id` references a user by id.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub author_id: Uuid,
}

impl Post {
    pub fn new(author_id: Uuid, body: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            body: body.to_string(),
            timestamp: OffsetDateTime::now_utc(),
            author_id,
        }
    }
}

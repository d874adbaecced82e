use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub body: String,
}

pub const MAX_PAGE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    /// Limit in `1..=MAX_PAGE`, offset never negative.
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, MAX_PAGE), self.offset.max(0))
    }
}

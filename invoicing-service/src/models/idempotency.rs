use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Stored outcome of a keyed mutating request. `response_status == 0` means pending.
#[derive(Debug, Clone, FromRow)]
pub struct IdempotencyRecord {
    pub id: i64,
    pub key: String,
    pub request_hash: String,
    pub method: String,
    pub path: String,
    pub tenant_schema: String,
    pub user_id: String,
    pub response_status: i32,
    pub response_body: Option<Vec<u8>>,
    pub created_utc: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl IdempotencyRecord {
    pub fn is_completed(&self) -> bool {
        self.response_status != 0
    }
}

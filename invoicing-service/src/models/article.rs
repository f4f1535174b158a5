use chrono::{DateTime, Utc};
use crate::services::money::serialize_cents;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Catalog article referenced by invoice lines.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(serialize_with = "serialize_cents")]
    pub unit_price: Decimal,
    pub active: bool,
    pub version: i64,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateArticle {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub unit_price: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Sparse update of an article. `version` is the version the caller last read.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleUpdate {
    pub version: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_price: Option<Decimal>,
    pub active: Option<bool>,
}

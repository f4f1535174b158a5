use chrono::{DateTime, Utc};
use crate::services::money::serialize_cents;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Money received against an invoice. Rows are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub invoice_id: i64,
    #[serde(serialize_with = "serialize_cents")]
    pub amount: Decimal,
    pub method: String,
    pub reference: String,
    pub note: String,
    pub paid_at: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

/// Body of `POST /invoices/{id}/payments`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePayment {
    pub amount: Decimal,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub method: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub reference: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub note: String,
    /// RFC 3339; defaults to now.
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

use super::{Invoice, InvoiceItem};
use chrono::{DateTime, Utc};
use crate::services::money::serialize_cents;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Immutable point-in-time copy of an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceVersion {
    pub id: i64,
    pub invoice_id: i64,
    pub version_no: i32,
    pub kind: String,
    pub snapshot: serde_json::Value,
    pub created_utc: DateTime<Utc>,
}

/// Serialized body of a version row: header, items and the paid rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub invoice_number: Option<String>,
    pub customer_id: i64,
    #[serde(serialize_with = "serialize_cents")]
    pub subtotal: Decimal,
    #[serde(serialize_with = "serialize_cents")]
    pub tax_total: Decimal,
    #[serde(serialize_with = "serialize_cents")]
    pub total: Decimal,
    pub draft: bool,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub items: Vec<InvoiceItem>,
    #[serde(serialize_with = "serialize_cents")]
    pub paid_total: Decimal,
}

impl InvoiceSnapshot {
    pub fn capture(invoice: &Invoice, items: &[InvoiceItem]) -> Self {
        Self {
            invoice_number: invoice.invoice_number.clone(),
            customer_id: invoice.customer_id,
            subtotal: invoice.subtotal,
            tax_total: invoice.tax_total,
            total: invoice.total,
            draft: invoice.draft,
            published: invoice.published,
            published_at: invoice.published_at,
            items: items.to_vec(),
            paid_total: invoice.paid_total,
        }
    }
}

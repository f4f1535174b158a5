//! Invoice model for invoicing-service.

use crate::services::lifecycle::{DocumentKind, DocumentState};
use chrono::{DateTime, Utc};
use crate::services::money::serialize_cents;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Current state of a commercial document. `draft = true` is a quotation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: Option<String>,
    pub customer_id: i64,
    #[serde(serialize_with = "serialize_cents")]
    pub subtotal: Decimal,
    #[serde(serialize_with = "serialize_cents")]
    pub tax_total: Decimal,
    #[serde(serialize_with = "serialize_cents")]
    pub total: Decimal,
    #[serde(serialize_with = "serialize_cents")]
    pub paid_total: Decimal,
    pub draft: bool,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_draft(self.draft)
    }

    pub fn state(&self) -> DocumentState {
        DocumentState::from_flags(self.draft, self.published)
    }
}

/// Line item owned by one invoice. Prices are snapshots taken when the line was written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub position: i32,
    pub article_id: Uuid,
    pub description: String,
    pub quantity: i32,
    #[serde(serialize_with = "serialize_cents")]
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    #[serde(serialize_with = "serialize_cents")]
    pub net_price: Decimal,
    #[serde(serialize_with = "serialize_cents")]
    pub tax_amount: Decimal,
    #[serde(serialize_with = "serialize_cents")]
    pub gross_price: Decimal,
}

/// Invoice header together with its items, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub kind: DocumentKind,
    pub state: DocumentState,
    pub items: Vec<InvoiceItem>,
}

impl InvoiceDetail {
    pub fn new(invoice: Invoice, items: Vec<InvoiceItem>) -> Self {
        Self {
            kind: invoice.kind(),
            state: invoice.state(),
            invoice,
            items,
        }
    }
}

/// One requested line. Quantity and price are checked by the pricing engine.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceItemInput {
    pub article_id: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "amount")]
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Body of `POST /invoice`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoice {
    #[serde(default, rename = "type")]
    pub kind: Option<DocumentKind>,
    /// Legacy selector used when `type` is absent.
    #[serde(default)]
    pub draft: Option<bool>,
    #[validate(range(min = 1))]
    pub customer_id: i64,
    pub items: Vec<InvoiceItemInput>,
}

impl CreateInvoice {
    /// `type` wins over the legacy flag; neither means a regular invoice.
    pub fn initial_draft(&self) -> bool {
        match self.kind {
            Some(kind) => kind.is_draft(),
            None => self.draft.unwrap_or(false),
        }
    }
}

/// Body of `PUT /invoices/{id}`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateInvoice {
    #[validate(range(min = 1))]
    pub customer_id: i64,
    pub items: Vec<InvoiceItemInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertInvoice {
    pub target: DocumentKind,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PublishInvoice {
    #[serde(default)]
    #[validate(length(max = 64))]
    pub invoice_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListInvoicesQuery {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: serde_json::Value) -> CreateInvoice {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn type_takes_precedence_over_legacy_flag() {
        let input = body(serde_json::json!({
            "type": "invoice",
            "draft": true,
            "customer_id": 1,
            "items": []
        }));
        assert!(!input.initial_draft());

        let input = body(serde_json::json!({
            "type": "quotation",
            "customer_id": 1,
            "items": []
        }));
        assert!(input.initial_draft());
    }

    #[test]
    fn legacy_flag_and_default() {
        let input = body(serde_json::json!({ "draft": true, "customer_id": 1, "items": [] }));
        assert!(input.initial_draft());

        let input = body(serde_json::json!({ "customer_id": 1, "items": [] }));
        assert!(!input.initial_draft());
    }

    #[test]
    fn customer_id_must_be_positive() {
        let input = body(serde_json::json!({ "customer_id": 0, "items": [] }));
        assert!(input.validate().is_err());
    }

    #[test]
    fn amount_is_accepted_as_quantity() {
        let item: InvoiceItemInput = serde_json::from_value(serde_json::json!({
            "article_id": "6f9619ff-8b86-d011-b42d-00cf4fc964ff",
            "amount": 3,
            "unit_price": "4.50"
        }))
        .unwrap();
        assert_eq!(item.quantity, 3);
        assert!(item.description.is_empty());
    }

    #[test]
    fn unscaled_money_renders_with_cents() {
        // NUMERIC zero comes back from Postgres with scale 0.
        let now = Utc::now();
        let invoice = Invoice {
            id: 1,
            invoice_number: None,
            customer_id: 1,
            subtotal: Decimal::from(20),
            tax_total: Decimal::new(4, 0),
            total: Decimal::new(2400, 2),
            paid_total: Decimal::ZERO,
            draft: true,
            published: false,
            published_at: None,
            created_utc: now,
            updated_utc: now,
        };
        let item = InvoiceItem {
            id: 1,
            invoice_id: 1,
            position: 0,
            article_id: Uuid::new_v4(),
            description: String::new(),
            quantity: 2,
            unit_price: Decimal::from(10),
            tax_rate: Decimal::new(2, 1),
            net_price: Decimal::from(20),
            tax_amount: Decimal::from(4),
            gross_price: Decimal::from(24),
        };

        let snapshot = serde_json::to_value(crate::models::InvoiceSnapshot::capture(
            &invoice,
            std::slice::from_ref(&item),
        ))
        .unwrap();
        assert_eq!(snapshot["paid_total"], "0.00");
        assert_eq!(snapshot["subtotal"], "20.00");
        assert_eq!(snapshot["items"][0]["net_price"], "20.00");

        let detail = serde_json::to_value(InvoiceDetail::new(invoice, vec![item])).unwrap();
        assert_eq!(detail["paid_total"], "0.00");
        assert_eq!(detail["tax_total"], "4.00");
        assert_eq!(detail["total"], "24.00");
        assert_eq!(detail["items"][0]["unit_price"], "10.00");
        assert_eq!(detail["items"][0]["tax_rate"], "0.2");
    }
}

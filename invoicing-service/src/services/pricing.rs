//! Invoice pricing: per-line net/tax/gross and the document totals.
//!
//! Every amount is rounded to cents as soon as it is produced, including the
//! running subtotal and tax total, so results match a ledger kept by hand.

use super::money::{bounded, checked_add, checked_mul};
use crate::models::InvoiceItemInput;
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub article_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub net: Decimal,
    pub tax: Decimal,
    pub gross: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedInvoice {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

/// Price an ordered list of lines at a flat tax rate.
pub fn price_lines(items: &[InvoiceItemInput], tax_rate: Decimal) -> Result<PricedInvoice, AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "at least one item is required"
        )));
    }

    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;

    for (index, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "items[{}]: quantity must be greater than zero",
                index
            )));
        }
        if item.unit_price <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "items[{}]: unit_price must be greater than zero",
                index
            )));
        }

        let unit_price = bounded(&format!("items[{}].unit_price", index), item.unit_price)?;
        let net = checked_mul("line net", unit_price, Decimal::from(item.quantity))?;
        let tax = checked_mul("line tax", net, tax_rate)?;
        let gross = checked_add("line gross", net, tax)?;

        subtotal = checked_add("subtotal", subtotal, net)?;
        tax_total = checked_add("tax total", tax_total, tax)?;

        lines.push(PricedLine {
            article_id: item.article_id,
            description: item.description.trim().to_string(),
            quantity: item.quantity,
            unit_price,
            tax_rate,
            net,
            tax,
            gross,
        });
    }

    let total = checked_add("total", subtotal, tax_total)?;

    Ok(PricedInvoice {
        lines,
        subtotal,
        tax_total,
        total,
    })
}

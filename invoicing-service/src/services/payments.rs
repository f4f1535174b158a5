//! Payment ledger: append payments and keep the invoice's paid rollup current.

use super::metrics::DB_QUERY_DURATION;
use super::money::bounded;
use super::TenantTx;
use crate::models::{CreatePayment, InvoiceVersion, Payment};
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};

impl TenantTx {
    /// Record a payment, refresh `paid_total` and snapshot the invoice.
    #[instrument(skip(self, input), fields(tenant = %self.tenant().schema, invoice_id = %invoice_id))]
    pub async fn record_payment(
        &mut self,
        invoice_id: i64,
        input: &CreatePayment,
    ) -> Result<(Payment, InvoiceVersion), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let amount = bounded("amount", input.amount)?;
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "amount must be greater than zero"
            )));
        }

        self.lock_invoice(invoice_id).await?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (invoice_id, amount, method, reference, note, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(amount)
        .bind(input.method.trim())
        .bind(input.reference.trim())
        .bind(input.note.trim())
        .bind(input.paid_at.unwrap_or_else(Utc::now))
        .fetch_one(self.conn())
        .await
        .map_err(|e| AppError::from_db_write("Failed to record payment", e))?;

        self.recalculate_paid_total(invoice_id).await?;

        let invoice = self.lock_invoice(invoice_id).await?;
        let version = self.record_snapshot(&invoice).await?;

        timer.observe_duration();

        info!(
            payment_id = payment.id,
            amount = %payment.amount,
            paid_total = %invoice.paid_total,
            "Payment recorded"
        );

        Ok((payment, version))
    }

    /// Sum of all payments (zero when there are none), rounded and stored on the invoice.
    pub async fn recalculate_paid_total(&mut self, invoice_id: i64) -> Result<Decimal, AppError> {
        let sum = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(self.conn())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e)))?;

        let paid_total = bounded("paid total", sum)?;

        sqlx::query("UPDATE invoices SET paid_total = $2, updated_utc = NOW() WHERE id = $1")
            .bind(invoice_id)
            .bind(paid_total)
            .execute(self.conn())
            .await
            .map_err(|e| AppError::from_db_write("Failed to update paid total", e))?;

        Ok(paid_total)
    }

    /// Payments of an invoice by `paid_at`, then insertion order.
    #[instrument(skip(self), fields(tenant = %self.tenant().schema, invoice_id = %invoice_id))]
    pub async fn list_payments(&mut self, invoice_id: i64) -> Result<Vec<Payment>, AppError> {
        if self.get_invoice(invoice_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("invoice not found")));
        }

        sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE invoice_id = $1 ORDER BY paid_at ASC, id ASC",
        )
        .bind(invoice_id)
        .fetch_all(self.conn())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))
    }
}

//! Append-only version snapshots of invoices.

use super::TenantTx;
use crate::models::{Invoice, InvoiceSnapshot, InvoiceVersion};
use service_core::error::AppError;
use tracing::{debug, instrument};

impl TenantTx {
    /// `max(version_no) + 1` for the invoice, 1 when it has none. The caller
    /// holds the invoice row lock, so concurrent writers cannot observe the same max.
    pub async fn next_version_no(&mut self, invoice_id: i64) -> Result<i32, AppError> {
        sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(version_no), 0) + 1 FROM invoice_versions WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(self.conn())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute next version: {}", e))
        })
    }

    /// Append a snapshot of the invoice as it is now, items and paid total included.
    #[instrument(skip(self, invoice), fields(tenant = %self.tenant().schema, invoice_id = %invoice.id))]
    pub async fn record_snapshot(&mut self, invoice: &Invoice) -> Result<InvoiceVersion, AppError> {
        let version_no = self.next_version_no(invoice.id).await?;
        let items = self.list_items(invoice.id).await?;
        let snapshot = serde_json::to_value(InvoiceSnapshot::capture(invoice, &items))
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode snapshot: {}", e)))?;

        let version = sqlx::query_as::<_, InvoiceVersion>(
            r#"
            INSERT INTO invoice_versions (invoice_id, version_no, kind, snapshot)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(version_no)
        .bind(invoice.kind().as_str())
        .bind(&snapshot)
        .fetch_one(self.conn())
        .await
        .map_err(|e| AppError::from_db_write("Failed to record invoice version", e))?;

        debug!(version_no = version.version_no, kind = %version.kind, "Invoice version recorded");

        Ok(version)
    }

    /// All versions of an invoice in ascending order.
    #[instrument(skip(self), fields(tenant = %self.tenant().schema, invoice_id = %invoice_id))]
    pub async fn list_versions(&mut self, invoice_id: i64) -> Result<Vec<InvoiceVersion>, AppError> {
        if self.get_invoice(invoice_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("invoice not found")));
        }

        sqlx::query_as::<_, InvoiceVersion>(
            "SELECT * FROM invoice_versions WHERE invoice_id = $1 ORDER BY version_no ASC",
        )
        .bind(invoice_id)
        .fetch_all(self.conn())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list versions: {}", e)))
    }
}

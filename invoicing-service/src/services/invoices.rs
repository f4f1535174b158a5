//! Invoice lifecycle operations: create, replace items, convert, publish.
//!
//! Each mutation locks the invoice row, applies its change and appends a
//! version snapshot inside the caller's tenant transaction.

use super::lifecycle::{self, DocumentKind, DocumentState};
use super::metrics::DB_QUERY_DURATION;
use super::pricing::{price_lines, PricedLine};
use super::TenantTx;
use crate::config::InvoicingPolicy;
use crate::models::{CreateInvoice, Invoice, InvoiceDetail, InvoiceItem, UpdateInvoice};
use chrono::Utc;
use service_core::error::AppError;
use sqlx::{Postgres, QueryBuilder};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, instrument};
use uuid::Uuid;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

impl TenantTx {
    /// Fail with one `BadRequest` if any referenced article is missing, or
    /// inactive when `require_active` is set.
    #[instrument(skip(self, article_ids), fields(tenant = %self.tenant().schema))]
    pub async fn validate_article_refs(
        &mut self,
        article_ids: &[Uuid],
        require_active: bool,
    ) -> Result<(), AppError> {
        let wanted: BTreeSet<Uuid> = article_ids.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = wanted.iter().copied().collect();

        let found: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM articles
            WHERE id = ANY($1) AND ($2::bool = FALSE OR active = TRUE)
            "#,
        )
        .bind(&ids)
        .bind(require_active)
        .fetch_all(self.conn())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check articles: {}", e)))?
        .into_iter()
        .collect();

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| id.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::BadRequest(anyhow::anyhow!(
                "one or more article_id do not exist or are inactive: {}",
                missing.join(", ")
            )))
        }
    }

    #[instrument(skip(self), fields(tenant = %self.tenant().schema, invoice_id = %invoice_id))]
    pub async fn get_invoice(&mut self, invoice_id: i64) -> Result<Option<Invoice>, AppError> {
        sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .fetch_optional(self.conn())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))
    }

    /// Load and row-lock an invoice so mutations on it serialize.
    pub(crate) async fn lock_invoice(&mut self, invoice_id: i64) -> Result<Invoice, AppError> {
        sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 FOR UPDATE")
            .bind(invoice_id)
            .fetch_optional(self.conn())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("invoice not found")))
    }

    pub async fn list_items(&mut self, invoice_id: i64) -> Result<Vec<InvoiceItem>, AppError> {
        sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = $1 ORDER BY position, id",
        )
        .bind(invoice_id)
        .fetch_all(self.conn())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice items: {}", e)))
    }

    pub async fn get_invoice_detail(&mut self, invoice_id: i64) -> Result<InvoiceDetail, AppError> {
        let invoice = self
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("invoice not found")))?;
        let items = self.list_items(invoice_id).await?;
        Ok(InvoiceDetail::new(invoice, items))
    }

    /// List invoices newest first, optionally filtered by state.
    #[instrument(skip(self), fields(tenant = %self.tenant().schema))]
    pub async fn list_invoices(
        &mut self,
        state: Option<DocumentState>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InvoiceDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM invoices");
        match state {
            Some(DocumentState::Quotation) => {
                query.push(" WHERE draft = TRUE AND published = FALSE");
            }
            Some(DocumentState::InvoiceDraft) => {
                query.push(" WHERE draft = FALSE AND published = FALSE");
            }
            Some(DocumentState::Published) => {
                query.push(" WHERE published = TRUE");
            }
            None => {}
        }
        query
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(limit.clamp(1, MAX_LIST_LIMIT))
            .push(" OFFSET ")
            .push_bind(offset.max(0));

        let invoices = query
            .build_query_as::<Invoice>()
            .fetch_all(self.conn())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        let ids: Vec<i64> = invoices.iter().map(|i| i.id).collect();
        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = ANY($1) ORDER BY invoice_id, position, id",
        )
        .bind(&ids)
        .fetch_all(self.conn())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice items: {}", e)))?;

        timer.observe_duration();

        let mut by_invoice: HashMap<i64, Vec<InvoiceItem>> = HashMap::new();
        for item in items {
            by_invoice.entry(item.invoice_id).or_default().push(item);
        }

        Ok(invoices
            .into_iter()
            .map(|invoice| {
                let items = by_invoice.remove(&invoice.id).unwrap_or_default();
                InvoiceDetail::new(invoice, items)
            })
            .collect())
    }

    async fn insert_items(
        &mut self,
        invoice_id: i64,
        lines: &[PricedLine],
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(
            "INSERT INTO invoice_items (invoice_id, position, article_id, description, quantity, \
             unit_price, tax_rate, net_price, tax_amount, gross_price) ",
        );
        query.push_values(lines.iter().enumerate(), |mut row, (position, line)| {
            row.push_bind(invoice_id)
                .push_bind(position as i32)
                .push_bind(line.article_id)
                .push_bind(line.description.clone())
                .push_bind(line.quantity)
                .push_bind(line.unit_price)
                .push_bind(line.tax_rate)
                .push_bind(line.net)
                .push_bind(line.tax)
                .push_bind(line.gross);
        });
        query.push(" RETURNING *");

        let mut items = query
            .build_query_as::<InvoiceItem>()
            .fetch_all(self.conn())
            .await
            .map_err(|e| AppError::from_db_write("Failed to insert invoice items", e))?;
        items.sort_by_key(|item| item.position);
        Ok(items)
    }

    /// Create a quotation or invoice with its items and version 1.
    #[instrument(skip(self, input, policy), fields(tenant = %self.tenant().schema, customer_id = %input.customer_id))]
    pub async fn create_invoice(
        &mut self,
        input: &CreateInvoice,
        policy: &InvoicingPolicy,
    ) -> Result<InvoiceDetail, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let priced = price_lines(&input.items, policy.tax_rate)?;
        let article_ids: Vec<Uuid> = priced.lines.iter().map(|l| l.article_id).collect();
        self.validate_article_refs(&article_ids, policy.require_active_articles)
            .await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (customer_id, subtotal, tax_total, total, paid_total, draft, published)
            VALUES ($1, $2, $3, $4, 0, $5, FALSE)
            RETURNING *
            "#,
        )
        .bind(input.customer_id)
        .bind(priced.subtotal)
        .bind(priced.tax_total)
        .bind(priced.total)
        .bind(input.initial_draft())
        .fetch_one(self.conn())
        .await
        .map_err(|e| AppError::from_db_write("Failed to create invoice", e))?;

        let items = self.insert_items(invoice.id, &priced.lines).await?;
        self.record_snapshot(&invoice).await?;

        timer.observe_duration();

        info!(invoice_id = invoice.id, kind = %invoice.kind(), total = %invoice.total, "Invoice created");

        Ok(InvoiceDetail::new(invoice, items))
    }

    /// Replace customer and the whole item set, reprice, and snapshot.
    #[instrument(skip(self, input, policy), fields(tenant = %self.tenant().schema, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &mut self,
        invoice_id: i64,
        input: &UpdateInvoice,
        policy: &InvoicingPolicy,
    ) -> Result<InvoiceDetail, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        self.lock_invoice(invoice_id).await?;

        let priced = price_lines(&input.items, policy.tax_rate)?;
        let article_ids: Vec<Uuid> = priced.lines.iter().map(|l| l.article_id).collect();
        self.validate_article_refs(&article_ids, policy.require_active_articles)
            .await?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(self.conn())
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to remove invoice items: {}", e))
            })?;

        let items = self.insert_items(invoice_id, &priced.lines).await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET customer_id = $2, subtotal = $3, tax_total = $4, total = $5, updated_utc = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(input.customer_id)
        .bind(priced.subtotal)
        .bind(priced.tax_total)
        .bind(priced.total)
        .fetch_one(self.conn())
        .await
        .map_err(|e| AppError::from_db_write("Failed to update invoice", e))?;

        self.record_snapshot(&invoice).await?;

        timer.observe_duration();

        info!(total = %invoice.total, items = items.len(), "Invoice items replaced");

        Ok(InvoiceDetail::new(invoice, items))
    }

    /// Switch between quotation and invoice. Items, totals, payments and number stay.
    #[instrument(skip(self), fields(tenant = %self.tenant().schema, invoice_id = %invoice_id))]
    pub async fn convert_invoice(
        &mut self,
        invoice_id: i64,
        target: DocumentKind,
    ) -> Result<InvoiceDetail, AppError> {
        self.lock_invoice(invoice_id).await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            "UPDATE invoices SET draft = $2, updated_utc = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(invoice_id)
        .bind(target.is_draft())
        .fetch_one(self.conn())
        .await
        .map_err(|e| AppError::from_db_write("Failed to convert invoice", e))?;

        self.record_snapshot(&invoice).await?;
        let items = self.list_items(invoice_id).await?;

        info!(kind = %target, "Invoice converted");

        Ok(InvoiceDetail::new(invoice, items))
    }

    /// Finalize: assign a number if needed, mark published and force invoice kind.
    #[instrument(skip(self), fields(tenant = %self.tenant().schema, invoice_id = %invoice_id))]
    pub async fn publish_invoice(
        &mut self,
        invoice_id: i64,
        requested_number: Option<&str>,
    ) -> Result<InvoiceDetail, AppError> {
        let current = self.lock_invoice(invoice_id).await?;
        let publication =
            lifecycle::publish(current.invoice_number.as_deref(), requested_number, Utc::now());

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET invoice_number = $2, published = TRUE, published_at = $3, draft = $4, updated_utc = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(&publication.invoice_number)
        .bind(publication.published_at)
        .bind(publication.draft)
        .fetch_one(self.conn())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "invoice number '{}' is already in use",
                    publication.invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to publish invoice: {}", e)),
        })?;

        self.record_snapshot(&invoice).await?;
        let items = self.list_items(invoice_id).await?;

        info!(invoice_number = %publication.invoice_number, "Invoice published");

        Ok(InvoiceDetail::new(invoice, items))
    }
}

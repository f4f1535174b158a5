//! Articles, customers and suppliers: creation, lookup and version-guarded updates.

use super::metrics::DB_QUERY_DURATION;
use super::money::bounded;
use super::patch::{begin_guarded_update, finish_guarded_update, PartialUpdate};
use super::TenantTx;
use crate::models::{Article, CreateArticle, CreateCustomer, CreateSupplier, Customer, Supplier};
use service_core::error::AppError;
use sqlx::postgres::PgRow;
use sqlx::{Encode, FromRow, Postgres, Type};
use std::fmt::Display;
use tracing::{info, instrument};
use uuid::Uuid;

impl TenantTx {
    /// Create a batch of articles; all or none.
    #[instrument(skip(self, inputs), fields(tenant = %self.tenant().schema, count = inputs.len()))]
    pub async fn create_articles(&mut self, inputs: &[CreateArticle]) -> Result<Vec<Article>, AppError> {
        if inputs.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "at least one article is required"
            )));
        }

        let mut created = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            if input.unit_price.is_sign_negative() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "articles[{}]: unit_price must not be negative",
                    index
                )));
            }

            let article = sqlx::query_as::<_, Article>(
                r#"
                INSERT INTO articles (id, name, description, unit_price, active)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(input.name.trim())
            .bind(input.description.trim())
            .bind(bounded(
                &format!("articles[{}].unit_price", index),
                input.unit_price,
            )?)
            .bind(input.active)
            .fetch_one(self.conn())
            .await
            .map_err(|e| AppError::from_db_write("Failed to create article", e))?;

            created.push(article);
        }

        info!(count = created.len(), "Articles created");

        Ok(created)
    }

    pub async fn get_article(&mut self, article_id: Uuid) -> Result<Article, AppError> {
        sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = $1")
            .bind(article_id)
            .fetch_optional(self.conn())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get article: {}", e)))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("article not found")))
    }

    #[instrument(skip(self, input), fields(tenant = %self.tenant().schema))]
    pub async fn create_customer(&mut self, input: &CreateCustomer) -> Result<Customer, AppError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (company_name, address, city, country, zip, homepage, uid, email,
                                   first_name, last_name, phone_number, mobile_number, salutation, title)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(input.company_name.trim())
        .bind(input.address.trim())
        .bind(input.city.trim())
        .bind(input.country.trim())
        .bind(input.zip.trim())
        .bind(input.homepage.trim())
        .bind(input.uid.trim())
        .bind(input.email.trim())
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.phone_number.trim())
        .bind(input.mobile_number.trim())
        .bind(input.salutation.trim())
        .bind(input.title.trim())
        .fetch_one(self.conn())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "customer '{}' already exists",
                    input.company_name.trim()
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create customer: {}", e)),
        })?;

        info!(customer_id = customer.id, "Customer created");

        Ok(customer)
    }

    pub async fn get_customer(&mut self, customer_id: i64) -> Result<Customer, AppError> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(customer_id)
            .fetch_optional(self.conn())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get customer: {}", e)))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("customer not found")))
    }

    #[instrument(skip(self, input), fields(tenant = %self.tenant().schema))]
    pub async fn create_supplier(&mut self, input: &CreateSupplier) -> Result<Supplier, AppError> {
        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (company_name, address, city, country, zip, homepage, uid, email,
                                   phone_number, mobile_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(input.company_name.trim())
        .bind(input.address.trim())
        .bind(input.city.trim())
        .bind(input.country.trim())
        .bind(input.zip.trim())
        .bind(input.homepage.trim())
        .bind(input.uid.trim())
        .bind(input.email.trim())
        .bind(input.phone_number.trim())
        .bind(input.mobile_number.trim())
        .fetch_one(self.conn())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "supplier '{}' already exists",
                    input.company_name.trim()
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create supplier: {}", e)),
        })?;

        info!(supplier_id = supplier.id, "Supplier created");

        Ok(supplier)
    }

    pub async fn get_supplier(&mut self, supplier_id: i64) -> Result<Supplier, AppError> {
        sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1")
            .bind(supplier_id)
            .fetch_optional(self.conn())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get supplier: {}", e)))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("supplier not found")))
    }

    /// Apply a sparse update only if the stored version still matches.
    ///
    /// Empty update: `BadRequest`. Unknown id: `NotFound`. Version moved on:
    /// `Conflict`, with the row left untouched.
    #[instrument(skip(self, update), fields(tenant = %self.tenant().schema, table = U::TABLE, id = %id))]
    pub async fn apply_patch<U, R, I>(&mut self, id: I, update: &U) -> Result<R, AppError>
    where
        U: PartialUpdate,
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        I: for<'q> Encode<'q, Postgres> + Type<Postgres> + Display + Copy + Send + Sync + 'static,
    {
        let changes = update.changes()?;
        if changes.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("no fields to update")));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_patch"])
            .start_timer();

        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            U::TABLE
        ))
        .bind(id)
        .fetch_one(self.conn())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to look up record: {}", e)))?;

        if !exists {
            return Err(AppError::NotFound(anyhow::anyhow!("record not found")));
        }

        let mut query = begin_guarded_update(U::TABLE, changes);
        query.push_bind(id);
        finish_guarded_update(&mut query, update.expected_version());

        let updated = query
            .build_query_as::<R>()
            .fetch_optional(self.conn())
            .await
            .map_err(|e| AppError::from_db_write("Failed to update record", e))?;

        timer.observe_duration();

        updated.ok_or_else(|| AppError::Conflict(anyhow::anyhow!("stale update, please reload")))
    }
}

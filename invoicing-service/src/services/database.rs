//! Database service for invoicing-service: pool, migrations and the tenant registry.

use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::tenancy::{search_path, validate_schema_name};
use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};

/// Tables every tenant schema carries. Statements are idempotent.
const TENANT_SCHEMA_DDL: &str = include_str!("../../sql/tenant_schema.sql");

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &Secret<String>,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url.expose_secret())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests use a lazily connected one).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations for the shared `public` tables.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Open a transaction whose `search_path` is confined to one tenant schema.
    ///
    /// The setting is transaction-local, so it is gone once the transaction ends
    /// and the pooled connection carries no tenant scope afterwards.
    pub async fn begin_tenant(&self, schema: &str) -> Result<Transaction<'static, Postgres>, AppError> {
        validate_schema_name(schema).map_err(|_| {
            AppError::Forbidden(anyhow::anyhow!("tenant is not accessible"))
        })?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;
        scope_to_schema(&mut tx, schema).await?;
        Ok(tx)
    }

    // -------------------------------------------------------------------------
    // Tenant registry
    // -------------------------------------------------------------------------

    /// Create a tenant schema with its tables and register it. Safe to repeat.
    #[instrument(skip(self), fields(tenant = %schema_name))]
    pub async fn provision_tenant(
        &self,
        schema_name: &str,
        company_name: &str,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["provision_tenant"])
            .start_timer();

        let schema_name = validate_schema_name(schema_name)?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", schema_name))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create schema: {}", e)))?;

        scope_to_schema(&mut tx, schema_name).await?;

        sqlx::raw_sql(TENANT_SCHEMA_DDL)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to apply tenant schema: {}", e))
            })?;

        sqlx::query(
            r#"
            INSERT INTO public.tenants (schema_name, company_name)
            VALUES ($1, $2)
            ON CONFLICT (schema_name) DO NOTHING
            "#,
        )
        .bind(schema_name)
        .bind(company_name.trim())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to register tenant: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit tenant provisioning: {}", e))
        })?;

        timer.observe_duration();

        info!("Tenant provisioned");

        Ok(())
    }

    /// Grant a user access to a tenant.
    #[instrument(skip(self), fields(tenant = %schema_name, user_id = %user_id))]
    pub async fn bind_member(&self, user_id: &str, schema_name: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO public.tenant_members (user_id, schema_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id, schema_name) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(schema_name)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound(anyhow::anyhow!("tenant '{}' does not exist", schema_name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to bind member: {}", e)),
        })?;

        Ok(())
    }

    /// Whether `user_id` is bound to the tenant. Checked on every request.
    #[instrument(skip(self), fields(tenant = %schema_name, user_id = %user_id))]
    pub async fn is_member(&self, user_id: &str, schema_name: &str) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["is_member"])
            .start_timer();

        let bound = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM public.tenant_members
                WHERE user_id = $1 AND schema_name = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(schema_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check tenant membership: {}", e))
        })?;

        timer.observe_duration();

        Ok(bound)
    }
}

async fn scope_to_schema(conn: &mut PgConnection, schema: &str) -> Result<(), AppError> {
    sqlx::query("SELECT set_config('search_path', $1, true)")
        .bind(search_path(schema))
        .execute(conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to scope transaction: {}", e)))?;
    Ok(())
}

//! Request-scoped unit of work confined to one tenant schema.

use crate::models::TenantContext;
use crate::services::Database;
use service_core::error::AppError;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::{debug, instrument};

/// One open transaction with `search_path` set to the caller's tenant.
///
/// Every storage operation of a request is a method on this handle. It is
/// consumed by [`TenantTx::commit`]; dropping it without committing (an early
/// `?`, a panic, a cancelled future) rolls everything back.
pub struct TenantTx {
    tx: Transaction<'static, Postgres>,
    tenant: TenantContext,
}

impl TenantTx {
    #[instrument(skip(db, tenant), fields(tenant = %tenant.schema))]
    pub async fn begin(db: &Database, tenant: TenantContext) -> Result<Self, AppError> {
        let tx = db.begin_tenant(&tenant.schema).await?;
        debug!("Tenant transaction opened");
        Ok(Self { tx, tenant })
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    #[instrument(skip(self), fields(tenant = %self.tenant.schema))]
    pub async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;
        debug!("Tenant transaction committed");
        Ok(())
    }
}

//! Services module for invoicing-service.

pub mod catalog;
pub mod database;
pub mod idempotency;
pub mod invoices;
pub mod jwt;
pub mod lifecycle;
pub mod metrics;
pub mod money;
pub mod patch;
pub mod payments;
pub mod pricing;
pub mod tenancy;
pub mod tenant_tx;
pub mod versions;

pub use database::Database;
pub use idempotency::{ClaimOutcome, StoredResponse};
pub use jwt::TokenVerifier;
pub use metrics::{
    get_metrics, init_metrics, record_error, record_idempotency_outcome, record_invoice_operation,
    record_payment,
};
pub use tenant_tx::TenantTx;

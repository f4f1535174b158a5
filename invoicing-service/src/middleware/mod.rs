//! Request pipeline: tenant resolution, idempotency and the scoped transaction extractor.

pub mod idempotency;
pub mod tenant;

pub use idempotency::idempotency_guard;
pub use tenant::tenant_resolver;

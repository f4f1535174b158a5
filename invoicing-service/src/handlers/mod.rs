//! HTTP handlers for invoicing-service.

pub mod articles;
pub mod health;
pub mod invoices;
pub mod parties;
pub mod payments;

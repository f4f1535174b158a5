//! Invoicing Service - multi-tenant quotations, invoices, payments and version history.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

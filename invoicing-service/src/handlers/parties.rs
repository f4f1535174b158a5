//! Customer and supplier endpoints.

use crate::models::{
    CreateCustomer, CreateSupplier, Customer, CustomerUpdate, Supplier, SupplierUpdate,
};
use crate::services::TenantTx;
use crate::utils::{AppJson, AppPath, ValidatedJson};
use axum::{http::StatusCode, Json};
use service_core::error::AppError;

pub async fn create_customer(
    mut tx: TenantTx,
    ValidatedJson(input): ValidatedJson<CreateCustomer>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    let customer = tx.create_customer(&input).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    AppPath(customer_id): AppPath<i64>,
    mut tx: TenantTx,
) -> Result<Json<Customer>, AppError> {
    let customer = tx.get_customer(customer_id).await?;
    tx.commit().await?;
    Ok(Json(customer))
}

pub async fn update_customer(
    AppPath(customer_id): AppPath<i64>,
    mut tx: TenantTx,
    AppJson(update): AppJson<CustomerUpdate>,
) -> Result<Json<Customer>, AppError> {
    let customer: Customer = tx.apply_patch(customer_id, &update).await?;
    tx.commit().await?;
    Ok(Json(customer))
}

pub async fn create_supplier(
    mut tx: TenantTx,
    ValidatedJson(input): ValidatedJson<CreateSupplier>,
) -> Result<(StatusCode, Json<Supplier>), AppError> {
    let supplier = tx.create_supplier(&input).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn get_supplier(
    AppPath(supplier_id): AppPath<i64>,
    mut tx: TenantTx,
) -> Result<Json<Supplier>, AppError> {
    let supplier = tx.get_supplier(supplier_id).await?;
    tx.commit().await?;
    Ok(Json(supplier))
}

pub async fn update_supplier(
    AppPath(supplier_id): AppPath<i64>,
    mut tx: TenantTx,
    AppJson(update): AppJson<SupplierUpdate>,
) -> Result<Json<Supplier>, AppError> {
    let supplier: Supplier = tx.apply_patch(supplier_id, &update).await?;
    tx.commit().await?;
    Ok(Json(supplier))
}

use crate::models::{CreatePayment, Payment};
use crate::services::{record_payment, TenantTx};
use crate::utils::{AppPath, ValidatedJson};
use axum::{http::StatusCode, Json};
use serde::Serialize;
use service_core::error::AppError;

pub async fn create_payment(
    AppPath(invoice_id): AppPath<i64>,
    mut tx: TenantTx,
    ValidatedJson(input): ValidatedJson<CreatePayment>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let (payment, _version) = tx.record_payment(invoice_id, &input).await?;
    tx.commit().await?;

    record_payment(&payment.method);

    Ok((StatusCode::CREATED, Json(payment)))
}

#[derive(Serialize)]
pub struct PaymentList {
    pub payments: Vec<Payment>,
}

pub async fn list_payments(
    AppPath(invoice_id): AppPath<i64>,
    mut tx: TenantTx,
) -> Result<Json<PaymentList>, AppError> {
    let payments = tx.list_payments(invoice_id).await?;
    tx.commit().await?;
    Ok(Json(PaymentList { payments }))
}

use crate::models::{
    ConvertInvoice, CreateInvoice, InvoiceDetail, InvoiceVersion, ListInvoicesQuery,
    PublishInvoice, UpdateInvoice,
};
use crate::services::invoices::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::services::lifecycle::DocumentState;
use crate::services::{record_error, record_invoice_operation, TenantTx};
use crate::startup::AppState;
use crate::utils::{AppJson, AppPath, ValidatedJson};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use service_core::error::AppError;
use validator::Validate;

/// Count the outcome of a lifecycle operation.
fn track<T>(operation: &str, result: Result<T, AppError>) -> Result<T, AppError> {
    match &result {
        Ok(_) => record_invoice_operation(operation, "ok"),
        Err(e) => {
            record_invoice_operation(operation, e.code());
            record_error(e.code());
        }
    }
    result
}

pub async fn create_invoice(
    State(state): State<AppState>,
    mut tx: TenantTx,
    ValidatedJson(input): ValidatedJson<CreateInvoice>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    let result = async {
        let detail = tx.create_invoice(&input, &state.config.invoicing).await?;
        tx.commit().await?;
        Ok::<_, AppError>(detail)
    }
    .await;
    let detail = track("create", result)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    AppPath(invoice_id): AppPath<i64>,
    mut tx: TenantTx,
    ValidatedJson(input): ValidatedJson<UpdateInvoice>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let result = async {
        let detail = tx
            .update_invoice(invoice_id, &input, &state.config.invoicing)
            .await?;
        tx.commit().await?;
        Ok::<_, AppError>(detail)
    }
    .await;
    Ok(Json(track("update", result)?))
}

pub async fn convert_invoice(
    AppPath(invoice_id): AppPath<i64>,
    mut tx: TenantTx,
    AppJson(input): AppJson<ConvertInvoice>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let result = async {
        let detail = tx.convert_invoice(invoice_id, input.target).await?;
        tx.commit().await?;
        Ok::<_, AppError>(detail)
    }
    .await;
    Ok(Json(track("convert", result)?))
}

/// The body is optional; an empty one publishes with the existing or a generated number.
pub async fn publish_invoice(
    AppPath(invoice_id): AppPath<i64>,
    mut tx: TenantTx,
    body: Bytes,
) -> Result<Json<InvoiceDetail>, AppError> {
    let input: PublishInvoice = if body.iter().all(u8::is_ascii_whitespace) {
        PublishInvoice::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid request body: {}", e)))?
    };
    input.validate()?;

    let result = async {
        let detail = tx
            .publish_invoice(invoice_id, input.invoice_number.as_deref())
            .await?;
        tx.commit().await?;
        Ok::<_, AppError>(detail)
    }
    .await;
    Ok(Json(track("publish", result)?))
}

pub async fn get_invoice(
    AppPath(invoice_id): AppPath<i64>,
    mut tx: TenantTx,
) -> Result<Json<InvoiceDetail>, AppError> {
    let detail = tx.get_invoice_detail(invoice_id).await?;
    tx.commit().await?;
    Ok(Json(detail))
}

#[derive(Serialize)]
pub struct InvoiceList {
    pub invoices: Vec<InvoiceDetail>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_invoices(
    Query(query): Query<ListInvoicesQuery>,
    mut tx: TenantTx,
) -> Result<Json<InvoiceList>, AppError> {
    let state = match query.kind.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(DocumentState::parse_filter(raw).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "type must be one of quotation, invoice, published"
            ))
        })?),
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let invoices = tx.list_invoices(state, limit, offset).await?;
    tx.commit().await?;

    Ok(Json(InvoiceList {
        invoices,
        limit,
        offset,
    }))
}

#[derive(Serialize)]
pub struct VersionList {
    pub versions: Vec<InvoiceVersion>,
}

pub async fn list_versions(
    AppPath(invoice_id): AppPath<i64>,
    mut tx: TenantTx,
) -> Result<Json<VersionList>, AppError> {
    let versions = tx.list_versions(invoice_id).await?;
    tx.commit().await?;
    Ok(Json(VersionList { versions }))
}

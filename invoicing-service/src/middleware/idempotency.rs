//! Idempotent replay of keyed mutating requests.
//!
//! Runs after tenant resolution. A claim is taken in one short transaction,
//! the handler runs in its own, and the outcome is stored in a third.

use crate::models::TenantContext;
use crate::services::idempotency::{fingerprint, normalize_key, IDEMPOTENCY_KEY_HEADER};
use crate::services::{record_idempotency_outcome, ClaimOutcome, StoredResponse, TenantTx};
use crate::startup::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use service_core::error::AppError;
use tracing::{error, info, warn};

pub const REPLAYED_HEADER: &str = "idempotent-replayed";

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn replay(stored: StoredResponse) -> Response {
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::OK);
    let mut response = (status, stored.body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
        .headers_mut()
        .insert(REPLAYED_HEADER, HeaderValue::from_static("true"));
    response
}

pub async fn idempotency_guard(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !is_mutating(req.method()) {
        return Ok(next.run(req).await);
    }

    let key = match req.headers().get(IDEMPOTENCY_KEY_HEADER) {
        None => None,
        Some(value) => {
            let raw = value.to_str().map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!("Idempotency-Key must be visible ASCII"))
            })?;
            normalize_key(raw, state.config.idempotency.max_key_length)?
        }
    };
    let Some(key) = key else {
        return Ok(next.run(req).await);
    };

    let tenant = req
        .extensions()
        .get::<TenantContext>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("tenant context missing")))?;

    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read request body: {}", e)))?
        .to_bytes();

    let method = parts.method.as_str().to_string();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let request_hash = fingerprint(&method, &path, &body, &tenant.schema, &tenant.user_id);

    let mut claim_tx = TenantTx::begin(&state.db, tenant.clone()).await?;
    let outcome = claim_tx
        .claim_idempotency_key(
            &key,
            &request_hash,
            &method,
            &path,
            state.config.idempotency.pending_takeover(),
        )
        .await?;
    claim_tx.commit().await?;

    match outcome {
        ClaimOutcome::Execute => record_idempotency_outcome("fresh"),
        ClaimOutcome::Replay(stored) => {
            record_idempotency_outcome("replayed");
            info!(status = stored.status, "Replaying stored response");
            return Ok(replay(stored));
        }
        ClaimOutcome::Mismatch => {
            record_idempotency_outcome("conflict");
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Idempotency-Key was already used for a different request"
            )));
        }
        ClaimOutcome::InProgress => {
            record_idempotency_outcome("in_progress");
            return Err(AppError::Conflict(anyhow::anyhow!(
                "request with this key is still in progress"
            )));
        }
    }

    let response = next.run(Request::from_parts(parts, Body::from(body))).await;

    let (parts, body) = response.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!(error = %e, "Failed to buffer response body");
            release(&state, tenant, &key).await;
            return Err(AppError::InternalError(anyhow::anyhow!(
                "Failed to buffer response body"
            )));
        }
    };

    if parts.status.is_server_error() {
        // The handler's transaction rolled back; let a retry run again.
        release(&state, tenant, &key).await;
    } else if let Err(e) = complete(&state, tenant, &key, parts.status, &body).await {
        error!(error = %e, "Failed to store idempotent response");
    }

    Ok(Response::from_parts(parts, Body::from(body)))
}

async fn complete(
    state: &AppState,
    tenant: TenantContext,
    key: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<(), AppError> {
    let mut tx = TenantTx::begin(&state.db, tenant).await?;
    tx.complete_idempotency_key(key, status.as_u16(), body).await?;
    tx.commit().await
}

async fn release(state: &AppState, tenant: TenantContext, key: &str) {
    let result = async {
        let mut tx = TenantTx::begin(&state.db, tenant).await?;
        tx.release_idempotency_key(key).await?;
        tx.commit().await
    }
    .await;

    if let Err(e) = result {
        warn!(error = %e, "Failed to release idempotency key");
    }
}

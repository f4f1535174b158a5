//! Tenant context resolution.
//!
//! The bearer token names a user and a tenant schema. The binding between the
//! two is re-checked against `public.tenant_members` on every request; nothing
//! about a tenant is cached in process.

use crate::models::TenantContext;
use crate::services::tenancy::is_valid_schema_name;
use crate::services::TenantTx;
use crate::startup::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use tracing::{debug, warn};

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })
}

/// Verify the caller and attach a [`TenantContext`] to the request.
pub async fn tenant_resolver(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())?;
    let claims = state.verifier.verify(token)?;

    let user_id = claims.sub.trim();
    let schema = claims.schema.trim();
    if user_id.is_empty() || schema.is_empty() {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "token does not identify a user and tenant"
        )));
    }
    if !is_valid_schema_name(schema) {
        warn!(schema = %schema, "Token carries an invalid tenant name");
        return Err(AppError::Forbidden(anyhow::anyhow!("tenant is not accessible")));
    }
    if !state.db.is_member(user_id, schema).await? {
        warn!(schema = %schema, user_id = %user_id, "User is not bound to tenant");
        return Err(AppError::Forbidden(anyhow::anyhow!("tenant is not accessible")));
    }

    debug!(schema = %schema, user_id = %user_id, "Tenant resolved");

    let context = TenantContext {
        schema: schema.to_string(),
        user_id: user_id.to_string(),
    };
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("tenant context missing")))
    }
}

/// Opens the request's tenant transaction before the handler body runs.
#[axum::async_trait]
impl FromRequestParts<AppState> for TenantTx {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let tenant = TenantContext::from_request_parts(parts, state).await?;
        TenantTx::begin(&state.db, tenant).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AppError::Unauthorized(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }
}

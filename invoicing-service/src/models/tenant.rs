use serde::{Deserialize, Serialize};

/// Bearer token claims: the user and the tenant schema they act in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub schema: String,
    pub exp: usize,
}

/// Verified caller identity, inserted into request extensions by the tenant resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub schema: String,
    pub user_id: String,
}

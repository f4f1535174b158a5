//! Tenant namespace names. A tenant is a PostgreSQL schema.

use once_cell::sync::Lazy;
use regex::Regex;
use service_core::error::AppError;

static SCHEMA_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("schema name pattern is valid"));

/// PostgreSQL truncates identifiers beyond this many bytes.
pub const MAX_SCHEMA_NAME_LEN: usize = 63;

const RESERVED: &[&str] = &["public", "information_schema"];

pub fn is_valid_schema_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_SCHEMA_NAME_LEN
        && SCHEMA_NAME.is_match(name)
        && !name.starts_with("pg_")
        && !RESERVED.contains(&name)
}

pub fn validate_schema_name(name: &str) -> Result<&str, AppError> {
    if is_valid_schema_name(name) {
        Ok(name)
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!(
            "invalid tenant schema name '{}'",
            name
        )))
    }
}

/// Schema name for a company: lower-cased, trimmed, spaces become underscores.
pub fn derive_schema_name(company_name: &str) -> Result<String, AppError> {
    let name = company_name.trim().to_lowercase().replace(' ', "_");
    validate_schema_name(&name)?;
    Ok(name)
}

/// `"schema", public` for `search_path`. Only call with a validated name.
pub(crate) fn search_path(schema: &str) -> String {
    format!("\"{}\", public", schema)
}

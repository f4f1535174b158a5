//! Explicit sparse-update builders for the optimistically locked entities.
//!
//! Each update type maps its present fields to `(column, value)` pairs; the
//! guarded write in [`crate::services::TenantTx::apply_patch`] turns them into
//! `UPDATE ... SET ..., version = version + 1 WHERE id = $n AND version = $m`.

use super::money::bounded;
use crate::models::{ArticleUpdate, CustomerUpdate, SupplierUpdate};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::{Postgres, QueryBuilder};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Money(Decimal),
    Bool(bool),
}

pub type FieldChange = (&'static str, FieldValue);

/// A versioned partial update of one table.
pub trait PartialUpdate {
    const TABLE: &'static str;

    /// Version the caller read before editing.
    fn expected_version(&self) -> i64;

    /// Present fields after normalization: text trimmed, money rounded.
    fn changes(&self) -> Result<Vec<FieldChange>, AppError>;
}

fn text(out: &mut Vec<FieldChange>, column: &'static str, value: &Option<String>) {
    if let Some(v) = value {
        out.push((column, FieldValue::Text(v.trim().to_string())));
    }
}

impl PartialUpdate for ArticleUpdate {
    const TABLE: &'static str = "articles";

    fn expected_version(&self) -> i64 {
        self.version
    }

    fn changes(&self) -> Result<Vec<FieldChange>, AppError> {
        let mut out = Vec::new();
        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::BadRequest(anyhow::anyhow!("name must not be empty")));
            }
            out.push(("name", FieldValue::Text(name.to_string())));
        }
        text(&mut out, "description", &self.description);
        if let Some(price) = self.unit_price {
            if price.is_sign_negative() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "unit_price must not be negative"
                )));
            }
            out.push(("unit_price", FieldValue::Money(bounded("unit_price", price)?)));
        }
        if let Some(active) = self.active {
            out.push(("active", FieldValue::Bool(active)));
        }
        Ok(out)
    }
}

impl PartialUpdate for CustomerUpdate {
    const TABLE: &'static str = "customers";

    fn expected_version(&self) -> i64 {
        self.version
    }

    fn changes(&self) -> Result<Vec<FieldChange>, AppError> {
        let mut out = Vec::new();
        text(&mut out, "company_name", &self.company_name);
        text(&mut out, "address", &self.address);
        text(&mut out, "city", &self.city);
        text(&mut out, "country", &self.country);
        text(&mut out, "zip", &self.zip);
        text(&mut out, "homepage", &self.homepage);
        text(&mut out, "uid", &self.uid);
        text(&mut out, "email", &self.email);
        text(&mut out, "first_name", &self.first_name);
        text(&mut out, "last_name", &self.last_name);
        text(&mut out, "phone_number", &self.phone_number);
        text(&mut out, "mobile_number", &self.mobile_number);
        text(&mut out, "salutation", &self.salutation);
        text(&mut out, "title", &self.title);
        Ok(out)
    }
}

impl PartialUpdate for SupplierUpdate {
    const TABLE: &'static str = "suppliers";

    fn expected_version(&self) -> i64 {
        self.version
    }

    fn changes(&self) -> Result<Vec<FieldChange>, AppError> {
        let mut out = Vec::new();
        text(&mut out, "company_name", &self.company_name);
        text(&mut out, "address", &self.address);
        text(&mut out, "city", &self.city);
        text(&mut out, "country", &self.country);
        text(&mut out, "zip", &self.zip);
        text(&mut out, "homepage", &self.homepage);
        text(&mut out, "uid", &self.uid);
        text(&mut out, "email", &self.email);
        text(&mut out, "phone_number", &self.phone_number);
        text(&mut out, "mobile_number", &self.mobile_number);
        Ok(out)
    }
}

/// Build the version-guarded UPDATE. The id is bound by the caller via `push_bind`
/// after this returns, followed by [`finish_guarded_update`].
pub fn begin_guarded_update<'args>(
    table: &'static str,
    changes: Vec<FieldChange>,
) -> QueryBuilder<'args, Postgres> {
    let mut builder = QueryBuilder::new("UPDATE ");
    builder.push(table).push(" SET ");
    {
        let mut set = builder.separated(", ");
        for (column, value) in changes {
            set.push(column).push_unseparated(" = ");
            match value {
                FieldValue::Text(v) => set.push_bind_unseparated(v),
                FieldValue::Money(v) => set.push_bind_unseparated(v),
                FieldValue::Bool(v) => set.push_bind_unseparated(v),
            };
        }
        set.push("version = version + 1");
    }
    builder.push(" WHERE id = ");
    builder
}

pub fn finish_guarded_update(builder: &mut QueryBuilder<'_, Postgres>, expected_version: i64) {
    builder
        .push(" AND version = ")
        .push_bind(expected_version)
        .push(" RETURNING *");
}

//! Customers and suppliers: the two contact entities with optimistic locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: i64,
    pub company_name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub zip: String,
    pub homepage: String,
    pub uid: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub mobile_number: String,
    pub salutation: String,
    pub title: String,
    pub version: i64,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Supplier {
    pub id: i64,
    pub company_name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub zip: String,
    pub homepage: String,
    pub uid: String,
    pub email: String,
    pub phone_number: String,
    pub mobile_number: String,
    pub version: i64,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomer {
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub uid: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default)]
    pub salutation: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSupplier {
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub uid: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub mobile_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerUpdate {
    pub version: i64,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub homepage: Option<String>,
    pub uid: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub mobile_number: Option<String>,
    pub salutation: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierUpdate {
    pub version: i64,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub homepage: Option<String>,
    pub uid: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub mobile_number: Option<String>,
}

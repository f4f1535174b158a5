//! Configuration module for invoicing-service.

use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub invoicing: InvoicingPolicy,
    pub idempotency: IdempotencyConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 key used to verify bearer tokens.
    pub jwt_secret: Secret<String>,
}

/// Business rules applied when pricing and validating invoices.
#[derive(Debug, Clone)]
pub struct InvoicingPolicy {
    pub tax_rate: Decimal,
    pub require_active_articles: bool,
}

impl Default for InvoicingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(20, 2),
            require_active_articles: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    pub max_key_length: usize,
    /// A pending record older than this is treated as abandoned and may be reclaimed.
    pub pending_takeover_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            max_key_length: 128,
            pending_takeover_secs: 120,
        }
    }
}

impl IdempotencyConfig {
    pub fn pending_takeover(&self) -> Duration {
        Duration::from_secs(self.pending_takeover_secs)
    }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl InvoicingConfig {
    /// Default settings around an explicit database URL and token secret.
    pub fn with_defaults(database_url: &str, jwt_secret: &str) -> Self {
        Self {
            common: core_config::Config::default(),
            service_name: "invoicing-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: Secret::new(database_url.to_string()),
                max_connections: 5,
                min_connections: 1,
                acquire_timeout_secs: 30,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(jwt_secret.to_string()),
            },
            invoicing: InvoicingPolicy::default(),
            idempotency: IdempotencyConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let tax_rate = match env::var("INVOICE_TAX_RATE") {
            Ok(raw) => Decimal::from_str(raw.trim()).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("INVOICE_TAX_RATE is invalid: {}", e))
            })?,
            Err(_) => InvoicingPolicy::default().tax_rate,
        };
        if tax_rate.is_sign_negative() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "INVOICE_TAX_RATE must not be negative"
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "invoicing-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: Secret::new(env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 2),
                acquire_timeout_secs: parse_env("DATABASE_ACQUIRE_TIMEOUT_SECS", 30),
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(env::var("JWT_SECRET").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("JWT_SECRET is required"))
                })?),
            },
            invoicing: InvoicingPolicy {
                tax_rate,
                require_active_articles: parse_env("INVOICE_REQUIRE_ACTIVE_ARTICLES", true),
            },
            idempotency: IdempotencyConfig {
                max_key_length: parse_env("IDEMPOTENCY_MAX_KEY_LENGTH", 128),
                pending_takeover_secs: parse_env("IDEMPOTENCY_PENDING_TAKEOVER_SECS", 120),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_defaults() {
        let policy = InvoicingPolicy::default();
        assert_eq!(policy.tax_rate.to_string(), "0.20");
        assert!(policy.require_active_articles);

        let idem = IdempotencyConfig::default();
        assert_eq!(idem.max_key_length, 128);
        assert_eq!(idem.pending_takeover(), Duration::from_secs(120));
    }

    #[test]
    fn with_defaults_keeps_policy_defaults() {
        let cfg = InvoicingConfig::with_defaults("postgres://localhost/test", "secret");
        assert_eq!(cfg.invoicing.tax_rate, Decimal::new(20, 2));
        assert_eq!(cfg.idempotency.max_key_length, 128);
        assert_eq!(cfg.common.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn parse_env_falls_back_on_garbage() {
        assert_eq!(parse_env("INVOICING_TEST_UNSET_VARIABLE", 7u32), 7);
    }
}

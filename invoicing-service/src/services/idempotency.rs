//! Idempotency keys: request fingerprinting and the two short units of work
//! around a keyed request (claim before the handler, completion after it).

use super::TenantTx;
use crate::models::IdempotencyRecord;
use chrono::Utc;
use service_core::error::AppError;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Response stored for a completed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// What the guard should do with a keyed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The key is ours now; run the handler.
    Execute,
    /// A completed response exists; return it without running the handler.
    Replay(StoredResponse),
    /// The key was used for a different request.
    Mismatch,
    /// An identical request holds the key and has not finished.
    InProgress,
}

/// SHA-256 over method, path with query, raw body, tenant and user.
pub fn fingerprint(method: &str, path_and_query: &str, body: &[u8], schema: &str, user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(path_and_query.as_bytes());
    hasher.update(b"\n");
    hasher.update(body);
    hasher.update(b"\n");
    hasher.update(schema.as_bytes());
    hasher.update(b"\n");
    hasher.update(user_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Trimmed key, `None` when blank. Over-long keys are rejected.
pub fn normalize_key(raw: &str, max_len: usize) -> Result<Option<String>, AppError> {
    let key = raw.trim();
    if key.is_empty() {
        return Ok(None);
    }
    if key.len() > max_len {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Idempotency-Key must be at most {} characters",
            max_len
        )));
    }
    Ok(Some(key.to_string()))
}

fn decide(record: &IdempotencyRecord, request_hash: &str, takeover: Duration) -> Decision {
    if record.request_hash.trim() != request_hash {
        return Decision::Outcome(ClaimOutcome::Mismatch);
    }
    if record.is_completed() {
        return Decision::Outcome(ClaimOutcome::Replay(StoredResponse {
            status: u16::try_from(record.response_status).unwrap_or(500),
            body: record.response_body.clone().unwrap_or_default(),
        }));
    }
    let age = Utc::now()
        .signed_duration_since(record.created_utc)
        .to_std()
        .unwrap_or_default();
    if age >= takeover {
        Decision::Reclaim
    } else {
        Decision::Outcome(ClaimOutcome::InProgress)
    }
}

enum Decision {
    Outcome(ClaimOutcome),
    Reclaim,
}

impl TenantTx {
    async fn find_idempotency_record(&mut self, key: &str) -> Result<Option<IdempotencyRecord>, AppError> {
        sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT * FROM idempotency_keys WHERE key = $1 FOR UPDATE",
        )
        .bind(key)
        .fetch_optional(self.conn())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to read idempotency key: {}", e))
        })
    }

    /// Look up the key and either take it (inserting a pending record) or report
    /// why the request must not run.
    #[instrument(skip(self, request_hash), fields(tenant = %self.tenant().schema))]
    pub async fn claim_idempotency_key(
        &mut self,
        key: &str,
        request_hash: &str,
        method: &str,
        path: &str,
        takeover: Duration,
    ) -> Result<ClaimOutcome, AppError> {
        let existing = match self.find_idempotency_record(key).await? {
            Some(record) => record,
            None => {
                let user_id = self.tenant().user_id.clone();
                let schema = self.tenant().schema.clone();
                let inserted = sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO idempotency_keys (key, request_hash, method, path, tenant_schema, user_id)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (key) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(key)
                .bind(request_hash)
                .bind(method)
                .bind(path)
                .bind(&schema)
                .bind(&user_id)
                .fetch_optional(self.conn())
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to store idempotency key: {}", e))
                })?;

                if inserted.is_some() {
                    debug!("Idempotency key claimed");
                    return Ok(ClaimOutcome::Execute);
                }

                // Lost the insert race; the winner's row is visible now.
                self.find_idempotency_record(key).await?.ok_or_else(|| {
                    AppError::InternalError(anyhow::anyhow!(
                        "idempotency key vanished after insert conflict"
                    ))
                })?
            }
        };

        match decide(&existing, request_hash, takeover) {
            Decision::Outcome(outcome) => Ok(outcome),
            Decision::Reclaim => {
                warn!(record_id = existing.id, "Reclaiming abandoned idempotency key");
                sqlx::query("UPDATE idempotency_keys SET created_utc = NOW() WHERE id = $1")
                    .bind(existing.id)
                    .execute(self.conn())
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to reclaim idempotency key: {}",
                            e
                        ))
                    })?;
                Ok(ClaimOutcome::Execute)
            }
        }
    }

    /// Persist the handler's final response against the key.
    #[instrument(skip(self, body), fields(tenant = %self.tenant().schema))]
    pub async fn complete_idempotency_key(
        &mut self,
        key: &str,
        status: u16,
        body: &[u8],
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET response_status = $2, response_body = $3, completed_at = NOW()
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(i32::from(status))
        .bind(body)
        .execute(self.conn())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to complete idempotency key: {}", e))
        })?;
        Ok(())
    }

    /// Drop a pending key so a retry executes again.
    #[instrument(skip(self), fields(tenant = %self.tenant().schema))]
    pub async fn release_idempotency_key(&mut self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM idempotency_keys WHERE key = $1 AND response_status = 0")
            .bind(key)
            .execute(self.conn())
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to release idempotency key: {}", e))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, status: i32, age_secs: i64) -> IdempotencyRecord {
        IdempotencyRecord {
            id: 1,
            key: "k".to_string(),
            request_hash: hash.to_string(),
            method: "POST".to_string(),
            path: "/invoice".to_string(),
            tenant_schema: "acme".to_string(),
            user_id: "u1".to_string(),
            response_status: status,
            response_body: (status != 0).then(|| b"{\"id\":1}".to_vec()),
            created_utc: Utc::now() - chrono::Duration::seconds(age_secs),
            completed_at: None,
        }
    }

    fn outcome(d: Decision) -> Option<ClaimOutcome> {
        match d {
            Decision::Outcome(o) => Some(o),
            Decision::Reclaim => None,
        }
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = fingerprint("POST", "/invoice", b"{}", "acme", "u1");
        assert_eq!(a, fingerprint("POST", "/invoice", b"{}", "acme", "u1"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint("POST", "/invoice", b"{ }", "acme", "u1"));
        assert_ne!(a, fingerprint("PUT", "/invoice", b"{}", "acme", "u1"));
        assert_ne!(a, fingerprint("POST", "/invoice?x=1", b"{}", "acme", "u1"));
        assert_ne!(a, fingerprint("POST", "/invoice", b"{}", "beta", "u1"));
        assert_ne!(a, fingerprint("POST", "/invoice", b"{}", "acme", "u2"));
    }

    #[test]
    fn key_normalization() {
        assert_eq!(normalize_key("  ", 128).unwrap(), None);
        assert_eq!(normalize_key(" abc ", 128).unwrap(), Some("abc".to_string()));
        assert!(normalize_key(&"k".repeat(128), 128).unwrap().is_some());
        assert!(matches!(
            normalize_key(&"k".repeat(129), 128),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn different_request_with_same_key_is_a_mismatch() {
        let d = decide(&record("aaa", 201, 0), "bbb", Duration::from_secs(120));
        assert_eq!(outcome(d), Some(ClaimOutcome::Mismatch));
    }

    #[test]
    fn completed_record_replays() {
        let d = decide(&record("aaa", 201, 0), "aaa", Duration::from_secs(120));
        assert_eq!(
            outcome(d),
            Some(ClaimOutcome::Replay(StoredResponse {
                status: 201,
                body: b"{\"id\":1}".to_vec(),
            }))
        );
    }

    #[test]
    fn fresh_pending_record_is_in_progress_and_stale_one_is_reclaimed() {
        let d = decide(&record("aaa", 0, 5), "aaa", Duration::from_secs(120));
        assert_eq!(outcome(d), Some(ClaimOutcome::InProgress));

        let d = decide(&record("aaa", 0, 600), "aaa", Duration::from_secs(120));
        assert!(outcome(d).is_none());
    }
}

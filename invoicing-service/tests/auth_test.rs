//! Tenant resolution and public endpoint tests. No database required.

mod common;

use axum::http::{Method, StatusCode};
use common::{offline_router, send, token_for};

#[tokio::test]
async fn missing_bearer_token_is_unauthorized() {
    let app = offline_router();

    let response = send(&app, Method::GET, "/invoices", None, None, None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "unauthorized");
}

#[tokio::test]
async fn forged_token_is_unauthorized() {
    let app = offline_router();

    let response = send(
        &app,
        Method::GET,
        "/invoices/1",
        Some("not.a.token"),
        None,
        None,
    )
    .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn token_without_tenant_is_unauthorized() {
    let app = offline_router();
    let token = token_for("someone", "   ");

    let response = send(&app, Method::GET, "/invoices", Some(&token), None, None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unsafe_tenant_name_is_forbidden() {
    let app = offline_router();
    let token = token_for("someone", "acme\"; DROP SCHEMA public; --");

    let response = send(
        &app,
        Method::POST,
        "/invoice",
        Some(&token),
        None,
        Some(serde_json::json!({ "customer_id": 1, "items": [] })),
    )
    .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["code"], "forbidden");
}

#[tokio::test]
async fn reserved_tenant_name_is_forbidden() {
    let app = offline_router();
    let token = token_for("someone", "public");

    let response = send(&app, Method::GET, "/invoices", Some(&token), None, None).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = offline_router();

    let response = send(&app, Method::GET, "/metrics", None, None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn readiness_reports_unavailable_database() {
    let app = offline_router();

    let response = send(&app, Method::GET, "/ready", None, None, None).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

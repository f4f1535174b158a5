//! Quotation to published invoice, with payments and version history.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn quotation_is_priced_and_snapshotted() {
    let app = TestApp::spawn().await;
    let customer_id = app.customer("Priced Customer").await;
    let article_id = app.article("Consulting hour", "10.00", true).await;

    let response = app
        .post(
            "/invoice",
            json!({
                "type": "quotation",
                "customer_id": customer_id,
                "items": [{ "article_id": article_id, "quantity": 2, "unit_price": "10.00" }],
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    let invoice = response.body;
    assert_eq!(invoice["subtotal"], "20.00");
    assert_eq!(invoice["tax_total"], "4.00");
    assert_eq!(invoice["total"], "24.00");
    assert_eq!(invoice["paid_total"], "0.00");
    assert_eq!(invoice["kind"], "quotation");
    assert_eq!(invoice["draft"], true);
    assert_eq!(invoice["published"], false);
    assert!(invoice["invoice_number"].is_null());

    let item = &invoice["items"][0];
    assert_eq!(item["net_price"], "20.00");
    assert_eq!(item["tax_amount"], "4.00");
    assert_eq!(item["gross_price"], "24.00");

    let id = invoice["id"].as_i64().expect("invoice id");
    let versions = app.get(&format!("/invoices/{}/versions", id)).await;
    assert_eq!(versions.status, StatusCode::OK);
    let versions = versions.body["versions"].as_array().cloned().unwrap_or_default();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0]["version_no"], 1);
    assert_eq!(versions[0]["kind"], "quotation");
    assert_eq!(versions[0]["snapshot"]["total"], "24.00");

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn payment_convert_and_publish_produce_sequential_versions() {
    let app = TestApp::spawn().await;
    let customer_id = app.customer("Lifecycle Customer").await;
    let article_id = app.article("Widget", "10.00", true).await;

    let created = app
        .post(
            "/invoice",
            json!({
                "draft": false,
                "customer_id": customer_id,
                "items": [{ "article_id": article_id, "amount": 2, "unit_price": "10.00" }],
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.body["kind"], "invoice");
    let id = created.body["id"].as_i64().expect("invoice id");

    // Payment
    let payment = app
        .post(
            &format!("/invoices/{}/payments", id),
            json!({ "amount": "24.00", "method": "bank-transfer" }),
        )
        .await;
    assert_eq!(payment.status, StatusCode::CREATED, "{}", payment.body);
    assert_eq!(payment.body["amount"], "24.00");

    let invoice = app.get(&format!("/invoices/{}", id)).await;
    assert_eq!(invoice.body["paid_total"], "24.00");

    // Convert then publish
    let converted = app
        .put(&format!("/invoices/{}/convert", id), json!({ "target": "quotation" }))
        .await;
    assert_eq!(converted.status, StatusCode::OK, "{}", converted.body);
    assert_eq!(converted.body["kind"], "quotation");
    assert_eq!(converted.body["draft"], true);
    assert_eq!(converted.body["paid_total"], "24.00");

    let published = app
        .put(&format!("/invoices/{}/publish", id), json!({}))
        .await;
    assert_eq!(published.status, StatusCode::OK, "{}", published.body);
    assert_eq!(published.body["published"], true);
    assert_eq!(published.body["draft"], false);
    assert_eq!(published.body["kind"], "invoice");
    assert_eq!(published.body["state"], "published");
    assert!(!published.body["published_at"].is_null());
    let number = published.body["invoice_number"]
        .as_str()
        .expect("published invoice has a number")
        .to_string();
    assert!(!number.is_empty());

    // Publishing again keeps the number
    let again = app
        .put(&format!("/invoices/{}/publish", id), json!({}))
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["invoice_number"], number.as_str());

    let versions = app.get(&format!("/invoices/{}/versions", id)).await;
    let numbers: Vec<i64> = versions.body["versions"]
        .as_array()
        .map(|list| list.iter().filter_map(|v| v["version_no"].as_i64()).collect())
        .unwrap_or_default();
    assert_eq!(numbers, (1..=numbers.len() as i64).collect::<Vec<_>>());
    assert_eq!(numbers.len(), 5);

    let second = versions.body["versions"][1]["snapshot"].clone();
    assert_eq!(second["paid_total"], "24.00");
    assert_eq!(versions.body["versions"][2]["kind"], "quotation");
    assert_eq!(versions.body["versions"][3]["kind"], "invoice");

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn requested_number_must_be_unique() {
    let app = TestApp::spawn().await;
    let customer_id = app.customer("Numbering Customer").await;
    let article_id = app.article("Widget", "5.00", true).await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let created = app
            .post(
                "/invoice",
                json!({
                    "type": "invoice",
                    "customer_id": customer_id,
                    "items": [{ "article_id": article_id, "quantity": 1, "unit_price": "5.00" }],
                }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
        ids.push(created.body["id"].as_i64().expect("invoice id"));
    }

    let first = app
        .put(
            &format!("/invoices/{}/publish", ids[0]),
            json!({ "invoice_number": "INV-0001" }),
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["invoice_number"], "INV-0001");

    let second = app
        .put(
            &format!("/invoices/{}/publish", ids[1]),
            json!({ "invoice_number": "INV-0001" }),
        )
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);

    let unpublished = app.get(&format!("/invoices/{}", ids[1])).await;
    assert_eq!(unpublished.body["published"], false);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn listing_filters_by_state() {
    let app = TestApp::spawn().await;
    let customer_id = app.customer("Listing Customer").await;
    let article_id = app.article("Widget", "1.00", true).await;

    for kind in ["quotation", "invoice"] {
        let created = app
            .post(
                "/invoice",
                json!({
                    "type": kind,
                    "customer_id": customer_id,
                    "items": [{ "article_id": article_id, "quantity": 3, "unit_price": "1.00" }],
                }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED);
    }

    let quotations = app.get("/invoices?type=quotation").await;
    assert_eq!(quotations.status, StatusCode::OK);
    let list = quotations.body["invoices"].as_array().cloned().unwrap_or_default();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["kind"], "quotation");
    assert_eq!(list[0]["items"].as_array().map(Vec::len), Some(1));

    let all = app.get("/invoices").await;
    assert_eq!(all.body["invoices"].as_array().map(Vec::len), Some(2));

    let bad = app.get("/invoices?type=receipt").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn missing_invoice_is_not_found() {
    let app = TestApp::spawn().await;

    assert_eq!(app.get("/invoices/999999").await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.get("/invoices/999999/versions").await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/invoices/999999/payments").await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.put("/invoices/999999/convert", json!({ "target": "invoice" }))
            .await
            .status,
        StatusCode::NOT_FOUND
    );

    let malformed = app.get("/invoices/not-a-number").await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["code"], "bad_request");

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn update_replaces_items_and_appends_version() {
    let app = TestApp::spawn().await;
    let customer_id = app.customer("Update Customer").await;
    let other_customer_id = app.customer("Update Customer Two").await;
    let widget = app.article("Widget", "10.00", true).await;
    let bolt = app.article("Bolt", "5.00", true).await;
    let retired = app.article("Retired", "2.00", false).await;

    let created = app
        .post(
            "/invoice",
            json!({
                "type": "quotation",
                "customer_id": customer_id,
                "items": [
                    { "article_id": widget, "quantity": 2, "unit_price": "10.00" },
                    { "article_id": bolt, "quantity": 1, "unit_price": "5.00" },
                ],
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.body["items"].as_array().map(Vec::len), Some(2));
    let id = created.body["id"].as_i64().expect("invoice id");
    let uri = format!("/invoices/{}", id);

    let updated = app
        .put(
            &uri,
            json!({
                "customer_id": other_customer_id,
                "items": [{ "article_id": bolt, "quantity": 3, "unit_price": "1.00" }],
            }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert_eq!(updated.body["customer_id"], other_customer_id);
    assert_eq!(updated.body["subtotal"], "3.00");
    assert_eq!(updated.body["tax_total"], "0.60");
    assert_eq!(updated.body["total"], "3.60");
    assert_eq!(updated.body["kind"], "quotation");
    let items = updated.body["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["article_id"], bolt.as_str());
    assert_eq!(items[0]["net_price"], "3.00");

    let versions = app.get(&format!("{}/versions", uri)).await;
    let list = versions.body["versions"].as_array().cloned().unwrap_or_default();
    assert_eq!(list.len(), 2);
    assert_eq!(list[1]["version_no"], 2);
    assert_eq!(list[1]["snapshot"]["total"], "3.60");
    assert_eq!(list[1]["snapshot"]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["snapshot"]["items"].as_array().map(Vec::len), Some(2));

    // A rejected update leaves items, totals and history untouched.
    let rejected = app
        .put(
            &uri,
            json!({
                "customer_id": customer_id,
                "items": [
                    { "article_id": widget, "quantity": 1, "unit_price": "10.00" },
                    { "article_id": retired, "quantity": 1, "unit_price": "2.00" },
                ],
            }),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);

    let empty = app
        .put(&uri, json!({ "customer_id": customer_id, "items": [] }))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let current = app.get(&uri).await;
    assert_eq!(current.body["customer_id"], other_customer_id);
    assert_eq!(current.body["subtotal"], "3.00");
    assert_eq!(current.body["items"].as_array().map(Vec::len), Some(1));
    let versions = app.get(&format!("{}/versions", uri)).await;
    assert_eq!(versions.body["versions"].as_array().map(Vec::len), Some(2));

    let missing = app
        .put(
            "/invoices/999999",
            json!({
                "customer_id": customer_id,
                "items": [{ "article_id": widget, "quantity": 1, "unit_price": "10.00" }],
            }),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn amounts_beyond_storage_are_bad_requests() {
    let app = TestApp::spawn().await;
    let customer_id = app.customer("Large Amounts Customer").await;
    let article_id = app.article("Widget", "10.00", true).await;

    let overflowing = app
        .post(
            "/invoice",
            json!({
                "customer_id": customer_id,
                "items": [{
                    "article_id": article_id,
                    "quantity": 2,
                    "unit_price": "79228162514264337593543950335",
                }],
            }),
        )
        .await;
    assert_eq!(overflowing.status, StatusCode::BAD_REQUEST, "{}", overflowing.body);
    assert_eq!(overflowing.body["code"], "bad_request");

    let created = app
        .post(
            "/invoice",
            json!({
                "customer_id": customer_id,
                "items": [{ "article_id": article_id, "quantity": 1, "unit_price": "10.00" }],
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["id"].as_i64().expect("invoice id");

    let payment = app
        .post(
            &format!("/invoices/{}/payments", id),
            json!({ "amount": "10000000000.00" }),
        )
        .await;
    assert_eq!(payment.status, StatusCode::BAD_REQUEST, "{}", payment.body);
    assert_eq!(payment.body["code"], "bad_request");

    let payments = app.get(&format!("/invoices/{}/payments", id)).await;
    assert_eq!(payments.body["payments"].as_array().map(Vec::len), Some(0));

    app.cleanup().await;
}

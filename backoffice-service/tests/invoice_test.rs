//! Invoice integration tests: totals, line item replacement and
//! cascade behavior.

mod common;

use common::{uuid_of, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn create_computes_totals_from_lines() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Totals Customer").await;
    let product = app.create_product("Priced Widget", "TOT-001", "12.50", 0).await;

    let response = app
        .post(
            "/invoices",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "issue_date": "2026-03-10",
                "items": [{
                    "product_id": uuid_of(&product, "product_id"),
                    "quantity": 3,
                    "unit_price": "12.50"
                }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let invoice: Value = response.json().await.expect("Failed to parse invoice");
    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["customer_name"], "Totals Customer");
    assert_eq!(invoice["subtotal"], "37.50");
    assert_eq!(invoice["tax_amount"], "0.00");
    assert_eq!(invoice["total_amount"], "37.50");
    assert_eq!(invoice["paid_amount"], "0.00");

    let items = invoice["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_name"], "Priced Widget");
    assert_eq!(items[0]["product_sku"], "TOT-001");
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(items[0]["total"], "37.50");
    assert_eq!(items[0]["position"], 0);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn tax_applies_to_the_subtotal() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Taxed Customer").await;
    let a = app.create_product("Widget A", "TAX-A", "10.00", 0).await;
    let b = app.create_product("Widget B", "TAX-B", "5.00", 0).await;

    let response = app
        .post(
            "/invoices",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "issue_date": "2026-03-10",
                "tax_rate": "8",
                "items": [
                    { "product_id": uuid_of(&a, "product_id"), "quantity": 2, "unit_price": "10.00" },
                    { "product_id": uuid_of(&b, "product_id"), "quantity": 1, "unit_price": "5.00" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let invoice: Value = response.json().await.expect("Failed to parse invoice");
    assert_eq!(invoice["subtotal"], "25.00");
    assert_eq!(invoice["tax_amount"], "2.00");
    assert_eq!(invoice["total_amount"], "27.00");

    // A fetch returns exactly what the create computed
    let fetched: Value = app
        .get(&format!("/invoices/{}", uuid_of(&invoice, "invoice_id")))
        .await
        .json()
        .await
        .expect("Failed to parse invoice");
    assert_eq!(fetched["subtotal"], "25.00");
    assert_eq!(fetched["total_amount"], "27.00");
    assert_eq!(fetched["items"].as_array().expect("items").len(), 2);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn update_replaces_the_line_item_set() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Replacing Customer").await;
    let product = app.create_product("Replaced Widget", "REP-001", "2.00", 0).await;
    let product_id = uuid_of(&product, "product_id");

    let five_lines: Vec<Value> = (0..5)
        .map(|_| json!({ "product_id": product_id, "quantity": 1, "unit_price": "2.00" }))
        .collect();

    let response = app
        .post(
            "/invoices",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "issue_date": "2026-03-10",
                "items": five_lines
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let invoice: Value = response.json().await.expect("Failed to parse invoice");
    assert_eq!(invoice["items"].as_array().expect("items").len(), 5);
    assert_eq!(invoice["subtotal"], "10.00");
    let invoice_id = uuid_of(&invoice, "invoice_id");

    let response = app
        .put(
            &format!("/invoices/{}", invoice_id),
            json!({
                "items": [
                    { "product_id": product_id, "quantity": 4, "unit_price": "3.00" },
                    { "product_id": product_id, "quantity": 1, "unit_price": "1.00" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let updated: Value = response.json().await.expect("Failed to parse invoice");
    let items = updated["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["position"], 0);
    assert_eq!(items[1]["position"], 1);
    assert_eq!(updated["subtotal"], "13.00");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn documents_require_at_least_one_line() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Empty Customer").await;
    let product = app.create_product("Some Widget", "EMP-001", "1.00", 0).await;

    let response = app
        .post(
            "/invoices",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "issue_date": "2026-03-10",
                "items": []
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    // Replacing the item set with nothing is just as invalid
    let response = app
        .post(
            "/invoices",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "issue_date": "2026-03-10",
                "items": [{
                    "product_id": uuid_of(&product, "product_id"),
                    "quantity": 1,
                    "unit_price": "1.00"
                }]
            }),
        )
        .await;
    let invoice: Value = response.json().await.expect("Failed to parse invoice");

    let response = app
        .put(
            &format!("/invoices/{}", uuid_of(&invoice, "invoice_id")),
            json!({ "items": [] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn unknown_customer_or_status_is_rejected() {
    let app = TestApp::spawn().await;

    let product = app.create_product("Lonely Widget", "UNK-001", "1.00", 0).await;
    let line = json!({
        "product_id": uuid_of(&product, "product_id"),
        "quantity": 1,
        "unit_price": "1.00"
    });

    let response = app
        .post(
            "/invoices",
            json!({
                "customer_id": Uuid::new_v4(),
                "issue_date": "2026-03-10",
                "items": [line]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let customer = app.create_customer("Present Customer").await;
    let line = json!({
        "product_id": uuid_of(&product, "product_id"),
        "quantity": 1,
        "unit_price": "1.00"
    });
    let response = app
        .post(
            "/invoices",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "status": "Draft",
                "issue_date": "2026-03-10",
                "items": [line]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn customer_name_is_snapshotted_at_write_time() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Original Name").await;
    let customer_id = uuid_of(&customer, "customer_id");
    let product = app.create_product("Named Widget", "SNAP-001", "1.00", 0).await;

    let invoice: Value = app
        .post(
            "/invoices",
            json!({
                "customer_id": customer_id,
                "issue_date": "2026-03-10",
                "items": [{
                    "product_id": uuid_of(&product, "product_id"),
                    "quantity": 1,
                    "unit_price": "1.00"
                }]
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse invoice");

    let response = app
        .put(
            &format!("/customers/{}", customer_id),
            json!({ "name": "Renamed Later" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let fetched: Value = app
        .get(&format!("/invoices/{}", uuid_of(&invoice, "invoice_id")))
        .await
        .json()
        .await
        .expect("Failed to parse invoice");
    assert_eq!(fetched["customer_name"], "Original Name");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn delete_cascades_to_items_and_unlinks_payments() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Deleting Customer").await;
    let customer_id = uuid_of(&customer, "customer_id");
    let product = app.create_product("Doomed Widget", "DEL-001", "100.00", 0).await;

    let invoice: Value = app
        .post(
            "/invoices",
            json!({
                "customer_id": customer_id,
                "status": "paid",
                "issue_date": "2026-03-10",
                "items": [{
                    "product_id": uuid_of(&product, "product_id"),
                    "quantity": 1,
                    "unit_price": "100.00"
                }]
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse invoice");
    let invoice_id = uuid_of(&invoice, "invoice_id");

    let payment: Value = app
        .post(
            "/payments",
            json!({
                "invoice_id": invoice_id,
                "amount": "100.00",
                "method": "bank_transfer",
                "status": "completed",
                "payment_date": "2026-03-11"
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse payment");

    // The paid invoice counts toward the rollup before the delete
    let stats: Value = app
        .get(&format!("/customers/{}", customer_id))
        .await
        .json()
        .await
        .expect("Failed to parse customer");
    assert_eq!(stats["total_orders"], 1);
    assert_eq!(stats["total_spent"], "100.00");

    let response = app.delete(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(response.status().as_u16(), 204);
    assert_eq!(app.get(&format!("/invoices/{}", invoice_id)).await.status().as_u16(), 404);

    // Items went with the invoice; the payment only lost its link
    let fetched: Value = app
        .get(&format!("/payments/{}", uuid_of(&payment, "payment_id")))
        .await
        .json()
        .await
        .expect("Failed to parse payment");
    assert!(fetched["invoice_id"].is_null());
    assert_eq!(fetched["amount"], "100.00");

    // And the rollup no longer sees the invoice
    let stats: Value = app
        .get(&format!("/customers/{}", customer_id))
        .await
        .json()
        .await
        .expect("Failed to parse customer");
    assert_eq!(stats["total_orders"], 0);
    assert_eq!(stats["total_spent"], "0.00");

    app.cleanup().await;
}

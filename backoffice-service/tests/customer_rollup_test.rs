//! Customer rollup integration tests: order stats derived from
//! invoices, refreshed inside every document transaction.

mod common;

use common::{uuid_of, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_invoice_with(
    app: &TestApp,
    customer_id: Uuid,
    product_id: Uuid,
    status: &str,
    issue_date: &str,
    amount: &str,
) -> Value {
    let response = app
        .post(
            "/invoices",
            json!({
                "customer_id": customer_id,
                "status": status,
                "issue_date": issue_date,
                "items": [{ "product_id": product_id, "quantity": 1, "unit_price": amount }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.expect("Failed to parse invoice")
}

#[tokio::test]
#[ignore]
async fn rollup_counts_only_paid_invoices() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Rolled Customer").await;
    let customer_id = uuid_of(&customer, "customer_id");
    let product = app.create_product("Rollup Widget", "ROLL-001", "1.00", 0).await;
    let product_id = uuid_of(&product, "product_id");

    create_invoice_with(&app, customer_id, product_id, "paid", "2026-01-10", "120.00").await;
    create_invoice_with(&app, customer_id, product_id, "paid", "2026-01-15", "80.00").await;
    create_invoice_with(&app, customer_id, product_id, "draft", "2026-02-01", "50.00").await;

    let stats: Value = app
        .get(&format!("/customers/{}", customer_id))
        .await
        .json()
        .await
        .expect("Failed to parse customer");

    // The draft does not count toward totals but does move the last
    // order date.
    assert_eq!(stats["total_orders"], 2);
    assert_eq!(stats["total_spent"], "200.00");
    assert_eq!(stats["last_order_date"], "2026-02-01");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn refresh_is_idempotent() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Refreshed Customer").await;
    let customer_id = uuid_of(&customer, "customer_id");
    let product = app.create_product("Refresh Widget", "ROLL-002", "1.00", 0).await;
    let product_id = uuid_of(&product, "product_id");

    create_invoice_with(&app, customer_id, product_id, "paid", "2026-01-10", "60.00").await;

    let first = app
        .db
        .refresh_customer(customer_id)
        .await
        .expect("Refresh failed")
        .expect("Customer missing");
    let second = app
        .db
        .refresh_customer(customer_id)
        .await
        .expect("Refresh failed")
        .expect("Customer missing");

    assert_eq!(first.total_orders, 1);
    assert_eq!(second.total_orders, first.total_orders);
    assert_eq!(second.total_spent, first.total_spent);
    assert_eq!(second.last_order_date, first.last_order_date);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn status_changes_move_the_rollup() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Changing Customer").await;
    let customer_id = uuid_of(&customer, "customer_id");
    let product = app.create_product("Change Widget", "ROLL-003", "1.00", 0).await;
    let product_id = uuid_of(&product, "product_id");

    let invoice =
        create_invoice_with(&app, customer_id, product_id, "draft", "2026-01-10", "75.00").await;
    let invoice_id = uuid_of(&invoice, "invoice_id");

    let stats: Value = app
        .get(&format!("/customers/{}", customer_id))
        .await
        .json()
        .await
        .expect("Failed to parse customer");
    assert_eq!(stats["total_orders"], 0);
    assert_eq!(stats["total_spent"], "0.00");

    let response = app
        .put(&format!("/invoices/{}", invoice_id), json!({ "status": "paid" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let stats: Value = app
        .get(&format!("/customers/{}", customer_id))
        .await
        .json()
        .await
        .expect("Failed to parse customer");
    assert_eq!(stats["total_orders"], 1);
    assert_eq!(stats["total_spent"], "75.00");

    let response = app
        .put(&format!("/invoices/{}", invoice_id), json!({ "status": "cancelled" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

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

#[tokio::test]
#[ignore]
async fn customers_with_documents_cannot_be_deleted() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Sticky Customer").await;
    let customer_id = uuid_of(&customer, "customer_id");
    let product = app.create_product("Sticky Widget", "ROLL-004", "1.00", 0).await;
    let product_id = uuid_of(&product, "product_id");

    let invoice =
        create_invoice_with(&app, customer_id, product_id, "draft", "2026-01-10", "10.00").await;

    let response = app.delete(&format!("/customers/{}", customer_id)).await;
    assert_eq!(response.status().as_u16(), 409);

    // Once the invoice is gone the customer can be removed
    let response = app
        .delete(&format!("/invoices/{}", uuid_of(&invoice, "invoice_id")))
        .await;
    assert_eq!(response.status().as_u16(), 204);

    let response = app.delete(&format!("/customers/{}", customer_id)).await;
    assert_eq!(response.status().as_u16(), 204);

    app.cleanup().await;
}

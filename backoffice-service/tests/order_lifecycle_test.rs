//! Order lifecycle integration tests: shipping and receiving move
//! stock exactly once, inside the document's transaction.

mod common;

use common::{uuid_of, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

async fn movements_for(app: &TestApp, product_id: Uuid) -> Vec<Value> {
    let page: Value = app
        .get(&format!("/stock-movements?product_id={}", product_id))
        .await
        .json()
        .await
        .expect("Failed to parse movements");
    page["items"].as_array().expect("items").clone()
}

async fn stock_of(app: &TestApp, product_id: Uuid) -> i64 {
    let product: Value = app
        .get(&format!("/products/{}", product_id))
        .await
        .json()
        .await
        .expect("Failed to parse product");
    product["stock"].as_i64().expect("stock")
}

#[tokio::test]
#[ignore]
async fn draft_orders_leave_stock_alone() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Order Customer").await;
    let product = app.create_product("Shipped Widget", "SHIP-001", "10.00", 50).await;
    let product_id = uuid_of(&product, "product_id");

    let response = app
        .post(
            "/sales-orders",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "order_date": "2026-03-01",
                "items": [{ "product_id": product_id, "quantity": 3, "unit_price": "10.00" }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let order: Value = response.json().await.expect("Failed to parse order");
    assert_eq!(order["status"], "draft");
    assert_eq!(stock_of(&app, product_id).await, 50);
    assert!(movements_for(&app, product_id).await.is_empty());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn shipping_deducts_stock_and_records_movements() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Shipping Customer").await;
    let product = app.create_product("Shipped Widget", "SHIP-002", "10.00", 50).await;
    let product_id = uuid_of(&product, "product_id");

    let order: Value = app
        .post(
            "/sales-orders",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "order_date": "2026-03-01",
                "items": [{ "product_id": product_id, "quantity": 3, "unit_price": "10.00" }]
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse order");
    let order_id = uuid_of(&order, "order_id");

    let response = app
        .put(&format!("/sales-orders/{}", order_id), json!({ "status": "shipped" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(stock_of(&app, product_id).await, 47);

    let movements = movements_for(&app, product_id).await;
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["movement_type"], "sale");
    assert_eq!(movements[0]["quantity_change"], -3);
    assert_eq!(movements[0]["stock_before"], 50);
    assert_eq!(movements[0]["stock_after"], 47);
    assert_eq!(movements[0]["reference_type"], "sales_order");
    assert_eq!(uuid_of(&movements[0], "reference_id"), order_id);
    assert_eq!(movements[0]["reason"], "Sales order ORD-001 shipped");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn an_order_ships_at_most_once() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Repeat Customer").await;
    let product = app.create_product("Shipped Widget", "SHIP-003", "10.00", 50).await;
    let product_id = uuid_of(&product, "product_id");

    let order: Value = app
        .post(
            "/sales-orders",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "order_date": "2026-03-01",
                "items": [{ "product_id": product_id, "quantity": 5, "unit_price": "10.00" }]
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse order");
    let order_id = uuid_of(&order, "order_id");
    let path = format!("/sales-orders/{}", order_id);

    app.put(&path, json!({ "status": "shipped" })).await;
    assert_eq!(stock_of(&app, product_id).await, 45);

    // Repeating the status, or leaving and re-entering it, does not
    // deduct again.
    app.put(&path, json!({ "status": "shipped" })).await;
    app.put(&path, json!({ "status": "delivered" })).await;
    app.put(&path, json!({ "status": "shipped" })).await;

    assert_eq!(stock_of(&app, product_id).await, 45);
    assert_eq!(movements_for(&app, product_id).await.len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn cancelled_orders_still_ship_once() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Undecided Customer").await;
    let product = app.create_product("Shipped Widget", "SHIP-004", "10.00", 20).await;
    let product_id = uuid_of(&product, "product_id");

    let order: Value = app
        .post(
            "/sales-orders",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "order_date": "2026-03-01",
                "items": [{ "product_id": product_id, "quantity": 2, "unit_price": "10.00" }]
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse order");
    let path = format!("/sales-orders/{}", uuid_of(&order, "order_id"));

    // Cancelled before ever shipping, then shipped after all: the
    // deduction happens, exactly once.
    app.put(&path, json!({ "status": "cancelled" })).await;
    app.put(&path, json!({ "status": "shipped" })).await;
    assert_eq!(stock_of(&app, product_id).await, 18);

    app.put(&path, json!({ "status": "cancelled" })).await;
    app.put(&path, json!({ "status": "shipped" })).await;
    assert_eq!(stock_of(&app, product_id).await, 18);
    assert_eq!(movements_for(&app, product_id).await.len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn insufficient_stock_fails_the_whole_update() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Greedy Customer").await;
    let plenty = app.create_product("Plenty Widget", "SHIP-005", "10.00", 50).await;
    let scarce = app.create_product("Scarce Widget", "SHIP-006", "10.00", 1).await;
    let plenty_id = uuid_of(&plenty, "product_id");
    let scarce_id = uuid_of(&scarce, "product_id");

    let order: Value = app
        .post(
            "/sales-orders",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "order_date": "2026-03-01",
                "items": [
                    { "product_id": plenty_id, "quantity": 10, "unit_price": "10.00" },
                    { "product_id": scarce_id, "quantity": 5, "unit_price": "10.00" }
                ]
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse order");
    let order_id = uuid_of(&order, "order_id");

    let response = app
        .put(&format!("/sales-orders/{}", order_id), json!({ "status": "shipped" }))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    // Nothing moved: not the first line, not the status
    assert_eq!(stock_of(&app, plenty_id).await, 50);
    assert_eq!(stock_of(&app, scarce_id).await, 1);
    assert!(movements_for(&app, plenty_id).await.is_empty());

    let fetched: Value = app
        .get(&format!("/sales-orders/{}", order_id))
        .await
        .json()
        .await
        .expect("Failed to parse order");
    assert_eq!(fetched["status"], "draft");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn orders_created_as_shipped_move_stock_immediately() {
    let app = TestApp::spawn().await;

    let customer = app.create_customer("Walk-in Customer").await;
    let product = app.create_product("Carried Widget", "SHIP-007", "10.00", 8).await;
    let product_id = uuid_of(&product, "product_id");

    let response = app
        .post(
            "/sales-orders",
            json!({
                "customer_id": uuid_of(&customer, "customer_id"),
                "status": "shipped",
                "order_date": "2026-03-01",
                "items": [{ "product_id": product_id, "quantity": 8, "unit_price": "10.00" }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    assert_eq!(stock_of(&app, product_id).await, 0);
    assert_eq!(movements_for(&app, product_id).await.len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn receiving_a_purchase_order_adds_stock() {
    let app = TestApp::spawn().await;

    let product = app.create_product("Ordered Widget", "RECV-001", "10.00", 4).await;
    let product_id = uuid_of(&product, "product_id");

    let po: Value = app
        .post(
            "/purchase-orders",
            json!({
                "supplier_name": "Acme Supply",
                "order_date": "2026-03-01",
                "items": [{ "product_id": product_id, "quantity": 5, "unit_cost": "6.00" }]
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse purchase order");
    let po_id = uuid_of(&po, "po_id");
    let path = format!("/purchase-orders/{}", po_id);

    assert_eq!(stock_of(&app, product_id).await, 4);

    let response = app.put(&path, json!({ "status": "received" })).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(stock_of(&app, product_id).await, 9);

    let movements = movements_for(&app, product_id).await;
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["movement_type"], "purchase");
    assert_eq!(movements[0]["quantity_change"], 5);
    assert_eq!(movements[0]["reference_type"], "purchase_order");
    assert_eq!(uuid_of(&movements[0], "reference_id"), po_id);
    assert_eq!(movements[0]["reason"], "Purchase order PO-000001 received");

    // Receiving is once-only as well
    app.put(&path, json!({ "status": "sent" })).await;
    app.put(&path, json!({ "status": "received" })).await;
    assert_eq!(stock_of(&app, product_id).await, 9);
    assert_eq!(movements_for(&app, product_id).await.len(), 1);

    app.cleanup().await;
}

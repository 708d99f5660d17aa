//! Health, readiness and metrics endpoint tests.

mod common;

use common::TestApp;

#[tokio::test]
#[ignore]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "backoffice-service");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn readiness_check_reports_ready_with_live_database() {
    let app = TestApp::spawn().await;

    let response = app.get("/ready").await;
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ready");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn metrics_endpoint_returns_prometheus_format() {
    let app = TestApp::spawn().await;

    // Touch the catalog so at least one query-duration sample exists.
    app.create_product("Metric Widget", "MET-001", "1.00", 0)
        .await;

    let response = app.get("/metrics").await;
    assert!(response.status().is_success());

    let body = response.text().await.expect("Failed to get response body");
    assert!(
        body.contains("backoffice_db_query_duration_seconds"),
        "Missing query duration metric: {}",
        body
    );

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn unknown_route_returns_not_found() {
    let app = TestApp::spawn().await;

    let response = app.get("/no-such-route").await;
    assert_eq!(response.status().as_u16(), 404);

    app.cleanup().await;
}

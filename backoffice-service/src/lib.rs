pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

use axum::extract::Request;
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::{
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{metrics::ERRORS_TOTAL, Database};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

/// Count failed responses by class so alerting does not need to scrape
/// logs. Success responses pass through untouched.
async fn error_metrics_middleware(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let error_type = match response.status().as_u16() {
        400 => Some("bad_request"),
        404 => Some("not_found"),
        409 => Some("conflict"),
        422 => Some("validation_error"),
        500..=599 => Some("internal"),
        _ => None,
    };
    if let Some(error_type) = error_type {
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();
    }

    response
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    db: Database,
}

impl Application {
    /// Build the application: connect the pool, assemble the router and
    /// bind the listener. Binding here lets port 0 resolve to the real
    /// port before the server starts serving.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let state = AppState {
            db: db.clone(),
            config: config.clone(),
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics))
            .route(
                "/products",
                post(handlers::products::create_product).get(handlers::products::list_products),
            )
            .route(
                "/products/:id",
                get(handlers::products::get_product)
                    .put(handlers::products::update_product)
                    .delete(handlers::products::delete_product),
            )
            .route(
                "/products/:id/stock-adjustments",
                post(handlers::products::adjust_stock),
            )
            .route("/reports/low-stock", get(handlers::products::low_stock_report))
            .route(
                "/customers",
                post(handlers::customers::create_customer).get(handlers::customers::list_customers),
            )
            .route(
                "/customers/:id",
                get(handlers::customers::get_customer)
                    .put(handlers::customers::update_customer)
                    .delete(handlers::customers::delete_customer),
            )
            .route(
                "/invoices",
                post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
            )
            .route(
                "/invoices/:id",
                get(handlers::invoices::get_invoice)
                    .put(handlers::invoices::update_invoice)
                    .delete(handlers::invoices::delete_invoice),
            )
            .route(
                "/sales-orders",
                post(handlers::sales_orders::create_sales_order)
                    .get(handlers::sales_orders::list_sales_orders),
            )
            .route(
                "/sales-orders/:id",
                get(handlers::sales_orders::get_sales_order)
                    .put(handlers::sales_orders::update_sales_order)
                    .delete(handlers::sales_orders::delete_sales_order),
            )
            .route(
                "/purchase-orders",
                post(handlers::purchase_orders::create_purchase_order)
                    .get(handlers::purchase_orders::list_purchase_orders),
            )
            .route(
                "/purchase-orders/:id",
                get(handlers::purchase_orders::get_purchase_order)
                    .put(handlers::purchase_orders::update_purchase_order)
                    .delete(handlers::purchase_orders::delete_purchase_order),
            )
            .route(
                "/payments",
                post(handlers::payments::create_payment).get(handlers::payments::list_payments),
            )
            .route(
                "/payments/:id",
                get(handlers::payments::get_payment)
                    .put(handlers::payments::update_payment)
                    .delete(handlers::payments::delete_payment),
            )
            .route(
                "/stock-movements",
                post(handlers::stock_movements::create_stock_movement)
                    .get(handlers::stock_movements::list_stock_movements),
            )
            .route(
                "/stock-movements/:id",
                get(handlers::stock_movements::get_stock_movement),
            )
            .route(
                "/stock-movements/:id/reason",
                patch(handlers::stock_movements::update_movement_reason),
            )
            .layer(from_fn(error_metrics_middleware))
            .layer(from_fn(metrics_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .layer(from_fn(request_id_middleware))
            .layer(from_fn(security_headers_middleware))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
            db,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Listening on port {}", self.port);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

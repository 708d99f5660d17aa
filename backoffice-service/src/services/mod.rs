//! Services module for backoffice-service.
//!
//! `database` owns the pool; the entity modules extend `Database` with
//! their operations. `sequence`, `totals` and `rollup` hold the
//! numbering, money and aggregate logic those operations share.

pub mod customers;
pub mod database;
pub mod documents;
pub mod invoices;
pub mod metrics;
pub mod payments;
pub mod products;
pub mod purchase_orders;
pub mod rollup;
pub mod sales_orders;
pub mod sequence;
pub mod stock;
pub mod totals;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
pub use sequence::DocumentFamily;

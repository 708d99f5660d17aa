//! Materialized aggregates.
//!
//! Customer order stats and invoice paid amounts are stored on their
//! rows but are pure functions of other tables. The refreshers here
//! recompute them from scratch inside the transaction that changed the
//! underlying data, so the stored values can never drift and running a
//! refresh twice is a no-op.

use service_core::error::AppError;
use sqlx::PgConnection;
use uuid::Uuid;

/// Recompute a customer's order stats from their invoices.
///
/// `total_orders` and `total_spent` count only paid invoices;
/// `last_order_date` is the most recent issue date across all of the
/// customer's invoices regardless of status. Unknown customer IDs are
/// ignored, which lets callers refresh after the customer row itself
/// was deleted.
pub(crate) async fn refresh_customer_stats(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE customers c
        SET total_orders = (
                SELECT COUNT(*)
                FROM invoices i
                WHERE i.customer_id = c.customer_id AND i.status = 'paid'
            ),
            total_spent = (
                SELECT COALESCE(SUM(i.total_amount), 0)
                FROM invoices i
                WHERE i.customer_id = c.customer_id AND i.status = 'paid'
            ),
            last_order_date = (
                SELECT MAX(i.issue_date)
                FROM invoices i
                WHERE i.customer_id = c.customer_id
            )
        WHERE c.customer_id = $1
        "#,
    )
    .bind(customer_id)
    .execute(conn)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to refresh customer stats: {}", e))
    })?;

    Ok(())
}

/// Recompute an invoice's paid amount as the sum of its completed
/// payments. Pending, failed and refunded payments do not count.
pub(crate) async fn refresh_invoice_paid_amount(
    conn: &mut PgConnection,
    invoice_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE invoices
        SET paid_amount = (
                SELECT COALESCE(SUM(p.amount), 0)
                FROM payments p
                WHERE p.invoice_id = invoices.invoice_id AND p.status = 'completed'
            ),
            updated_utc = NOW()
        WHERE invoice_id = $1
        "#,
    )
    .bind(invoice_id)
    .execute(conn)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to refresh paid amount: {}", e))
    })?;

    Ok(())
}

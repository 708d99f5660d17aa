//! Invoice operations.
//!
//! An invoice and its line items are written together in one
//! transaction; header totals are always derived from the lines before
//! the write. Whenever an invoice changes, the owning customer's order
//! stats are refreshed in the same transaction.

use crate::models::{CreateInvoice, Invoice, InvoiceItem, ListInvoicesFilter, UpdateInvoice};
use crate::services::database::Database;
use crate::services::documents::{customer_name, snapshot_items, ItemSnapshot};
use crate::services::metrics::{DB_QUERY_DURATION, DOCUMENTS_CREATED_TOTAL, DOCUMENT_AMOUNT_TOTAL};
use crate::services::rollup::refresh_customer_stats;
use crate::services::sequence::{allocate_number, DocumentFamily};
use crate::services::totals::DocumentTotals;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

async fn insert_invoice_items(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    items: &[ItemSnapshot],
) -> Result<(), AppError> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                item_id, invoice_id, product_id, product_name, product_sku,
                quantity, unit_price, total, position
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(&item.product_sku)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total)
        .bind(position as i32)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
        })?;
    }

    Ok(())
}

impl Database {
    /// Create an invoice with its line items, numbering it and
    /// refreshing the customer's stats in the same transaction.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        if input.items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice must have at least one line item"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let name = customer_name(&mut tx, input.customer_id).await?;
        let items = snapshot_items(&mut tx, &input.items).await?;
        let line_totals: Vec<Decimal> = items.iter().map(|i| i.total).collect();
        let totals = DocumentTotals::compute(&line_totals, input.tax_rate);
        let invoice_number = allocate_number(&mut tx, DocumentFamily::Invoice).await?;

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, customer_id, customer_name, status,
                issue_date, due_date, subtotal, tax_rate, tax_amount, total_amount, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING invoice_id, invoice_number, customer_id, customer_name, status,
                issue_date, due_date, subtotal, tax_rate, tax_amount, total_amount,
                paid_amount, notes, created_utc, updated_utc
            "#,
        )
        .bind(invoice_id)
        .bind(&invoice_number)
        .bind(input.customer_id)
        .bind(&name)
        .bind(input.status.as_str())
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(totals.subtotal)
        .bind(input.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        insert_invoice_items(&mut tx, invoice_id, &items).await?;
        refresh_customer_stats(&mut tx, input.customer_id).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        DOCUMENTS_CREATED_TOTAL.with_label_values(&["invoice"]).inc();
        if let Some(amount) = invoice.total_amount.to_f64() {
            DOCUMENT_AMOUNT_TOTAL
                .with_label_values(&["invoice"])
                .inc_by(amount);
        }

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, customer_id, customer_name, status,
                issue_date, due_date, subtotal, tax_rate, tax_amount, total_amount,
                paid_amount, notes, created_utc, updated_utc
            FROM invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get an invoice's line items in document order.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT item_id, invoice_id, product_id, product_name, product_sku,
                quantity, unit_price, total, position, created_utc
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY position, created_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// List invoices with optional filters.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Invoice>(
                r#"
                SELECT invoice_id, invoice_number, customer_id, customer_name, status,
                    issue_date, due_date, subtotal, tax_rate, tax_amount, total_amount,
                    paid_amount, notes, created_utc, updated_utc
                FROM invoices
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR customer_id = $2)
                  AND ($3::date IS NULL OR issue_date >= $3)
                  AND ($4::date IS NULL OR issue_date <= $4)
                  AND invoice_id > $5
                ORDER BY invoice_id
                LIMIT $6
                "#,
            )
            .bind(&status_str)
            .bind(filter.customer_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Invoice>(
                r#"
                SELECT invoice_id, invoice_number, customer_id, customer_name, status,
                    issue_date, due_date, subtotal, tax_rate, tax_amount, total_amount,
                    paid_amount, notes, created_utc, updated_utc
                FROM invoices
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR customer_id = $2)
                  AND ($3::date IS NULL OR issue_date >= $3)
                  AND ($4::date IS NULL OR issue_date <= $4)
                ORDER BY invoice_id
                LIMIT $5
                "#,
            )
            .bind(&status_str)
            .bind(filter.customer_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Update an invoice. A submitted item list replaces the stored
    /// one wholesale; totals are recomputed whenever items or the tax
    /// rate arrive. Stats are refreshed for the old and, if repointed,
    /// the new customer.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, customer_id, customer_name, status,
                issue_date, due_date, subtotal, tax_rate, tax_amount, total_amount,
                paid_amount, notes, created_utc, updated_utc
            FROM invoices
            WHERE invoice_id = $1
            FOR UPDATE
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?;

        let existing = match existing {
            Some(invoice) => invoice,
            None => {
                tx.rollback().await.ok();
                return Ok(None);
            }
        };

        let customer_id = input.customer_id.unwrap_or(existing.customer_id);
        let name = if customer_id != existing.customer_id {
            customer_name(&mut tx, customer_id).await?
        } else {
            existing.customer_name.clone()
        };

        let status = input
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| existing.status.clone());
        let issue_date = input.issue_date.unwrap_or(existing.issue_date);
        let due_date = input.due_date.or(existing.due_date);
        let tax_rate = input.tax_rate.unwrap_or(existing.tax_rate);
        let notes = input.notes.clone().or_else(|| existing.notes.clone());

        let totals = if let Some(ref new_items) = input.items {
            let items = snapshot_items(&mut tx, new_items).await?;

            sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to replace line items: {}", e))
                })?;
            insert_invoice_items(&mut tx, invoice_id, &items).await?;

            let line_totals: Vec<Decimal> = items.iter().map(|i| i.total).collect();
            DocumentTotals::compute(&line_totals, tax_rate)
        } else if input.tax_rate.is_some() {
            let line_totals = sqlx::query_scalar::<_, Decimal>(
                "SELECT total FROM invoice_items WHERE invoice_id = $1 ORDER BY position",
            )
            .bind(invoice_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to read line items: {}", e))
            })?;
            DocumentTotals::compute(&line_totals, tax_rate)
        } else {
            DocumentTotals {
                subtotal: existing.subtotal,
                tax_amount: existing.tax_amount,
                total_amount: existing.total_amount,
            }
        };

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET customer_id = $2,
                customer_name = $3,
                status = $4,
                issue_date = $5,
                due_date = $6,
                tax_rate = $7,
                subtotal = $8,
                tax_amount = $9,
                total_amount = $10,
                notes = $11,
                updated_utc = NOW()
            WHERE invoice_id = $1
            RETURNING invoice_id, invoice_number, customer_id, customer_name, status,
                issue_date, due_date, subtotal, tax_rate, tax_amount, total_amount,
                paid_amount, notes, created_utc, updated_utc
            "#,
        )
        .bind(invoice_id)
        .bind(customer_id)
        .bind(&name)
        .bind(&status)
        .bind(issue_date)
        .bind(due_date)
        .bind(tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        refresh_customer_stats(&mut tx, existing.customer_id).await?;
        if customer_id != existing.customer_id {
            refresh_customer_stats(&mut tx, customer_id).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, "Invoice updated");

        Ok(Some(invoice))
    }

    /// Delete an invoice and its line items, then refresh the
    /// customer's stats. Payments that referenced it keep their rows
    /// and lose the link.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let customer_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT customer_id FROM invoices WHERE invoice_id = $1 FOR UPDATE",
        )
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?;

        let customer_id = match customer_id {
            Some(id) => id,
            None => {
                tx.rollback().await.ok();
                return Ok(false);
            }
        };

        sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        refresh_customer_stats(&mut tx, customer_id).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, "Invoice deleted");

        Ok(true)
    }
}

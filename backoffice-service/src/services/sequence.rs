//! Sequential document numbering.
//!
//! Every document family carries its own counter row in
//! `document_sequences`; allocation happens in SQL via
//! `next_document_number`, which locks the row, reconciles the counter
//! against numbers already present in the document table and returns
//! the formatted identifier. The Rust side only knows how the numbers
//! look so it can format and parse them for reports and tests.

use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::instrument;

/// Document family, each with its own number sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFamily {
    Invoice,
    SalesOrder,
    PurchaseOrder,
    Payment,
}

impl DocumentFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFamily::Invoice => "invoice",
            DocumentFamily::SalesOrder => "sales_order",
            DocumentFamily::PurchaseOrder => "purchase_order",
            DocumentFamily::Payment => "payment",
        }
    }

    /// Number prefix, without the separating dash.
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentFamily::Invoice => "INV",
            DocumentFamily::SalesOrder => "ORD",
            DocumentFamily::PurchaseOrder => "PO",
            DocumentFamily::Payment => "PAY",
        }
    }

    /// Minimum digit count; numbers grow wider rather than truncate.
    pub fn pad_width(&self) -> usize {
        match self {
            DocumentFamily::PurchaseOrder => 6,
            _ => 3,
        }
    }

    /// Format a counter value as a document number.
    pub fn format_number(&self, value: u64) -> String {
        format!(
            "{}-{:0width$}",
            self.prefix(),
            value,
            width = self.pad_width()
        )
    }

    /// Extract the numeric suffix from a document number of this
    /// family. Returns `None` for foreign or malformed identifiers,
    /// which the sequence scan skips over.
    pub fn parse_suffix(&self, number: &str) -> Option<u64> {
        let digits = number.strip_prefix(self.prefix())?.strip_prefix('-')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// Allocate the next number for a family inside an open transaction.
/// The SQL function serializes concurrent allocations on the counter
/// row, so two documents can never receive the same number.
pub(crate) async fn allocate_number(
    conn: &mut PgConnection,
    family: DocumentFamily,
) -> Result<String, AppError> {
    sqlx::query_scalar::<_, String>("SELECT next_document_number($1)")
        .bind(family.as_str())
        .fetch_one(conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to allocate {} number: {}",
                family.as_str(),
                e
            ))
        })
}

impl Database {
    /// Allocate the next document number for a family outside any
    /// surrounding transaction.
    #[instrument(skip(self), fields(family = family.as_str()))]
    pub async fn allocate_document_number(
        &self,
        family: DocumentFamily,
    ) -> Result<String, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["allocate_document_number"])
            .start_timer();

        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        let number = allocate_number(&mut conn, family).await?;

        timer.observe_duration();

        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentFamily;

    #[test]
    fn formats_with_family_pad_width() {
        assert_eq!(DocumentFamily::Invoice.format_number(1), "INV-001");
        assert_eq!(DocumentFamily::Invoice.format_number(42), "INV-042");
        assert_eq!(DocumentFamily::SalesOrder.format_number(7), "ORD-007");
        assert_eq!(DocumentFamily::Payment.format_number(999), "PAY-999");
        assert_eq!(DocumentFamily::PurchaseOrder.format_number(1), "PO-000001");
    }

    #[test]
    fn width_grows_past_the_pad() {
        assert_eq!(DocumentFamily::Invoice.format_number(1000), "INV-1000");
        assert_eq!(
            DocumentFamily::PurchaseOrder.format_number(1_000_000),
            "PO-1000000"
        );
    }

    #[test]
    fn parses_own_numbers() {
        assert_eq!(DocumentFamily::Invoice.parse_suffix("INV-001"), Some(1));
        assert_eq!(DocumentFamily::Invoice.parse_suffix("INV-042"), Some(42));
        assert_eq!(DocumentFamily::Invoice.parse_suffix("INV-1000"), Some(1000));
        assert_eq!(
            DocumentFamily::PurchaseOrder.parse_suffix("PO-000123"),
            Some(123)
        );
    }

    #[test]
    fn rejects_foreign_and_malformed_numbers() {
        assert_eq!(DocumentFamily::Invoice.parse_suffix("INV-BAD"), None);
        assert_eq!(DocumentFamily::Invoice.parse_suffix("INV-"), None);
        assert_eq!(DocumentFamily::Invoice.parse_suffix("INV"), None);
        assert_eq!(DocumentFamily::Invoice.parse_suffix("ORD-001"), None);
        assert_eq!(DocumentFamily::Invoice.parse_suffix("INV-0 1"), None);
        assert_eq!(DocumentFamily::Invoice.parse_suffix(""), None);
    }

    #[test]
    fn round_trips_through_format() {
        for family in [
            DocumentFamily::Invoice,
            DocumentFamily::SalesOrder,
            DocumentFamily::PurchaseOrder,
            DocumentFamily::Payment,
        ] {
            let number = family.format_number(57);
            assert_eq!(family.parse_suffix(&number), Some(57));
        }
    }
}

//! Payment model for backoffice-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Check,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::Other => "other",
        }
    }

    /// Strict parse; method strings are case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "check" => Some(PaymentMethod::Check),
            "other" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

/// Payment status. Only `completed` payments count toward an invoice's
/// paid amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Strict parse; status strings are case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// Payment record, optionally applied against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub payment_number: String,
    pub customer_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: String,
    pub status: String,
    pub payment_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Filter parameters for listing payments.
#[derive(Debug, Clone, Default)]
pub struct ListPaymentsFilter {
    pub status: Option<PaymentStatus>,
    pub customer_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating a payment.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub customer_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub payment_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Input for updating a payment. `invoice_id` repoints the payment at
/// another invoice; the paid amounts of both invoices are recomputed.
#[derive(Debug, Clone, Default)]
pub struct UpdatePayment {
    pub invoice_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,
    pub payment_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

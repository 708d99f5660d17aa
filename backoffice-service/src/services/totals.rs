//! Monetary totals for multi-line documents.
//!
//! All money is carried as `Decimal` and rounded to two places with
//! midpoint-away-from-zero, the rounding a cash register uses. Line
//! totals are rounded first; the subtotal sums the rounded lines; tax
//! applies to the subtotal as a percentage rate.

use rust_decimal::{Decimal, RoundingStrategy};

/// Scale used for every persisted monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Round a monetary amount to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Total for one line: quantity times unit price, rounded.
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    round_money(Decimal::from(quantity) * unit_price)
}

/// Header-level monetary fields derived from a document's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl DocumentTotals {
    /// Compute header totals from already-rounded line totals and a
    /// percentage tax rate.
    pub fn compute(line_totals: &[Decimal], tax_rate: Decimal) -> Self {
        let subtotal = round_money(line_totals.iter().copied().sum());
        let tax_amount = round_money(subtotal * tax_rate / Decimal::from(100));
        let total_amount = subtotal + tax_amount;

        Self {
            subtotal,
            tax_amount,
            total_amount,
        }
    }
}

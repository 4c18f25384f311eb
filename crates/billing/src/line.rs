//! Line items and derived totals shared by invoices and credit notes.

use serde::{Deserialize, Serialize};

use clearway_core::{DomainError, DomainResult, TaxRate, ValueObject};

fn default_unit() -> String {
    "un".to_string()
}

/// One billed line. Prices are minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Assigned by the owning document (1-based, contiguous).
    #[serde(default)]
    pub line_no: u32,
    pub description: String,
    pub quantity: i64,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub unit_price: i64,
    #[serde(default = "default_tax_rate")]
    pub tax_rate: TaxRate,
}

fn default_tax_rate() -> TaxRate {
    TaxRate::ZERO
}

impl LineItem {
    pub fn new(
        description: impl Into<String>,
        quantity: i64,
        unit_price: i64,
        tax_rate: TaxRate,
    ) -> Self {
        Self {
            line_no: 0,
            description: description.into(),
            quantity,
            unit: default_unit(),
            unit_price,
            tax_rate,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("line description is required"));
        }
        if self.quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }
        if self.unit_price < 0 {
            return Err(DomainError::validation("line unit_price must not be negative"));
        }
        Ok(())
    }

    /// `quantity × unit_price`.
    pub fn subtotal(&self) -> DomainResult<i64> {
        self.quantity
            .checked_mul(self.unit_price)
            .ok_or_else(|| DomainError::validation("line amount overflow"))
    }

    pub fn tax(&self) -> DomainResult<i64> {
        self.tax_rate
            .tax_on(self.subtotal()?)
            .ok_or_else(|| DomainError::validation("line tax overflow"))
    }
}

impl ValueObject for LineItem {}

/// Validate and renumber items 1..=n in their given order.
pub fn number_lines(items: &[LineItem]) -> DomainResult<Vec<LineItem>> {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            item.validate()?;
            let line_no = u32::try_from(idx + 1)
                .map_err(|_| DomainError::validation("too many lines"))?;
            Ok(LineItem {
                line_no,
                ..item.clone()
            })
        })
        .collect()
}

/// Derived document totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: i64,
    pub tax_amount: i64,
    pub total: i64,
}

impl Totals {
    /// Recompute totals from scratch; tax is rounded per line.
    pub fn compute(items: &[LineItem]) -> DomainResult<Totals> {
        let overflow = || DomainError::validation("document total overflow");
        let mut subtotal: i64 = 0;
        let mut tax_amount: i64 = 0;
        for item in items {
            subtotal = subtotal.checked_add(item.subtotal()?).ok_or_else(overflow)?;
            tax_amount = tax_amount.checked_add(item.tax()?).ok_or_else(overflow)?;
        }
        let total = subtotal.checked_add(tax_amount).ok_or_else(overflow)?;
        Ok(Totals {
            subtotal,
            tax_amount,
            total,
        })
    }
}

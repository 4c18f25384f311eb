//! Configurable billing policies.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use clearway_core::DomainError;

/// What to do with a receipt that takes cumulative receipts past the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// Accept it; the outstanding balance goes negative.
    #[default]
    Allow,
    Reject,
}

/// Upper bound on the value credited against one invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPolicy {
    #[default]
    Unbounded,
    /// Credit notes may not exceed the invoice total minus what is already credited.
    CapAtInvoiceBalance,
}

impl FromStr for OverpaymentPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "reject" => Ok(Self::Reject),
            other => Err(DomainError::validation(format!(
                "unknown overpayment policy `{other}`"
            ))),
        }
    }
}

impl FromStr for CreditPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unbounded" => Ok(Self::Unbounded),
            "cap" | "cap_at_invoice_balance" => Ok(Self::CapAtInvoiceBalance),
            other => Err(DomainError::validation(format!(
                "unknown credit policy `{other}`"
            ))),
        }
    }
}

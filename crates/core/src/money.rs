//! Money value objects.
//!
//! Amounts are integer minor units (cents). There is no currency conversion:
//! every sum is taken within a single currency.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Three-letter upper-case currency code (ISO-4217 style), e.g. `MZN`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub fn parse(code: &str) -> DomainResult<Self> {
        let bytes = code.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(DomainError::validation(format!(
                "currency must be a three-letter upper-case code, got `{code}`"
            )));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII upper-case letters get past `parse`.
        core::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.as_str().to_string()
    }
}

impl ValueObject for Currency {}

/// Tax rate in basis points (1% = 100 bps).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    pub const ZERO: TaxRate = TaxRate(0);
    const MAX_BPS: u32 = 100 * 100;

    pub fn from_bps(bps: u32) -> DomainResult<Self> {
        if bps > Self::MAX_BPS {
            return Err(DomainError::validation(format!(
                "tax rate {bps} bps exceeds 100%"
            )));
        }
        Ok(Self(bps))
    }

    /// Whole-percent rate, clamped to 100%.
    pub fn percent(pct: u32) -> Self {
        Self(pct.saturating_mul(100).min(Self::MAX_BPS))
    }

    pub fn bps(&self) -> u32 {
        self.0
    }

    /// Tax on `amount`, rounded half away from zero. `None` on overflow.
    pub fn tax_on(&self, amount: i64) -> Option<i64> {
        let num = i128::from(amount) * i128::from(self.0);
        let quotient = num / 10_000;
        let remainder = num % 10_000;
        let rounded = if remainder.abs() * 2 >= 10_000 {
            quotient + num.signum()
        } else {
            quotient
        };
        i64::try_from(rounded).ok()
    }
}

impl ValueObject for TaxRate {}

/// An amount tagged with its currency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Strictly positive amount, as required for receipts and payment requests.
    pub fn positive(amount: i64, currency: Currency) -> DomainResult<Self> {
        if amount <= 0 {
            return Err(DomainError::validation("amount must be greater than zero"));
        }
        Ok(Self::new(amount, currency))
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        if self.currency != other.currency {
            return Err(DomainError::currency_mismatch(self.currency, other.currency));
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| DomainError::validation("amount overflow"))?;
        Ok(Money::new(amount, self.currency))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}

impl ValueObject for Money {}

//! Runtime configuration from environment variables.

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

use clearway_billing::{CreditPolicy, OverpaymentPolicy};

use crate::sequence::DEFAULT_WIDTH;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: `{value}` ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Business policies applied by the application services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policies {
    /// Days between invoice issue date and due date.
    pub payment_terms_days: u32,
    pub overpayment: OverpaymentPolicy,
    pub credit: CreditPolicy,
    /// Block phase advance while the phase has pending payment requests.
    pub settle_payment_requests: bool,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            payment_terms_days: 30,
            overpayment: OverpaymentPolicy::default(),
            credit: CreditPolicy::default(),
            settle_payment_requests: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres URL; in-memory stores when absent.
    pub database_url: Option<String>,
    pub number_width: usize,
    pub policies: Policies,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            number_width: DEFAULT_WIDTH,
            policies: Policies::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading from a map (tests).
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        let bind_addr = parse_or(&lookup, "CLEARWAY_BIND_ADDR", defaults.bind_addr)?;
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let number_width = parse_or(&lookup, "CLEARWAY_NUMBER_WIDTH", defaults.number_width)?;
        if number_width == 0 || number_width > 12 {
            return Err(ConfigError::Invalid {
                key: "CLEARWAY_NUMBER_WIDTH",
                value: number_width.to_string(),
                reason: "must be between 1 and 12".to_string(),
            });
        }

        let policies = Policies {
            payment_terms_days: parse_or(
                &lookup,
                "CLEARWAY_PAYMENT_TERMS_DAYS",
                defaults.policies.payment_terms_days,
            )?,
            overpayment: parse_or(
                &lookup,
                "CLEARWAY_OVERPAYMENT_POLICY",
                defaults.policies.overpayment,
            )?,
            credit: parse_or(&lookup, "CLEARWAY_CREDIT_POLICY", defaults.policies.credit)?,
            settle_payment_requests: parse_or(
                &lookup,
                "CLEARWAY_SETTLE_PAYMENT_REQUESTS",
                defaults.policies.settle_payment_requests,
            )?,
        };

        Ok(Self {
            bind_addr,
            database_url,
            number_width,
            policies,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = AppConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert!(cfg.policies.settle_payment_requests);
    }

    #[test]
    fn reads_policies() {
        let cfg = AppConfig::from_map(&vars(&[
            ("CLEARWAY_OVERPAYMENT_POLICY", "reject"),
            ("CLEARWAY_CREDIT_POLICY", "cap"),
            ("CLEARWAY_SETTLE_PAYMENT_REQUESTS", "false"),
            ("CLEARWAY_PAYMENT_TERMS_DAYS", "45"),
            ("DATABASE_URL", "postgres://localhost/clearway"),
        ]))
        .unwrap();

        assert_eq!(cfg.policies.overpayment, OverpaymentPolicy::Reject);
        assert_eq!(cfg.policies.credit, CreditPolicy::CapAtInvoiceBalance);
        assert!(!cfg.policies.settle_payment_requests);
        assert_eq!(cfg.policies.payment_terms_days, 45);
        assert!(cfg.database_url.is_some());
    }

    #[test]
    fn invalid_values_are_reported_with_their_key() {
        let err = AppConfig::from_map(&vars(&[("CLEARWAY_PAYMENT_TERMS_DAYS", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "CLEARWAY_PAYMENT_TERMS_DAYS",
                ..
            }
        ));

        assert!(AppConfig::from_map(&vars(&[("CLEARWAY_NUMBER_WIDTH", "0")])).is_err());
    }
}

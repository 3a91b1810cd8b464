//! Rate snapshots as published by the rate source.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One source-provided batch of mid rates for a single table and effective date.
///
/// Field names follow the NBP wire format (`effectiveDate`, `rates[].currency`,
/// `rates[].mid`). The effective date is kept as the raw string; the importer
/// owns parsing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSnapshot {
    pub table: String,
    /// Publication number, e.g. `002/B/NBP/2024`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no: Option<String>,
    pub effective_date: String,
    #[serde(default)]
    pub rates: Vec<SnapshotRate>,
}

/// A single quoted currency inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRate {
    #[serde(rename = "currency")]
    pub currency_name: String,
    pub code: String,
    /// Read from the JSON number text, never through `f64`.
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub mid: Decimal,
}

impl RateSnapshot {
    pub fn new(table: impl Into<String>, effective_date: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            no: None,
            effective_date: effective_date.into(),
            rates: Vec::new(),
        }
    }

    /// Builder-style helper, mostly for fixtures.
    pub fn with_rate(mut self, code: &str, currency_name: &str, mid: Decimal) -> Self {
        self.rates.push(SnapshotRate {
            currency_name: currency_name.to_string(),
            code: code.to_string(),
            mid,
        });
        self
    }
}

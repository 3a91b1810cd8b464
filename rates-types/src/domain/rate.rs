//! Currency rate rows and the rules that apply before they are stored.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::snapshot::SnapshotRate;
use crate::error::DomainError;

/// The only table imported today.
pub const DEFAULT_TABLE: &str = "B";

/// Fractional digits kept for a mid rate (`NUMERIC(18, 8)`).
pub const MID_RATE_SCALE: u32 = 8;

/// Integer digits available for a mid rate (`18 - 8`).
const MID_RATE_INTEGER_DIGITS: u32 = 10;

/// A stored currency rate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRate {
    pub id: i64,
    pub table: String,
    /// Case-sensitive: `USD` and `usd` are different series.
    pub code: String,
    pub currency_name: String,
    pub mid_rate: Decimal,
    pub effective_date: NaiveDate,
}

/// A row about to be inserted by an import run.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCurrencyRate {
    pub table: String,
    pub code: String,
    pub currency_name: String,
    pub mid_rate: Decimal,
    pub effective_date: NaiveDate,
}

impl NewCurrencyRate {
    /// Stamps a snapshot entry with its table and effective date.
    ///
    /// # Validation
    /// - Mid rate must fit `NUMERIC(18, 8)` after rounding to 8 places
    pub fn from_snapshot(
        table: &str,
        effective_date: NaiveDate,
        rate: &SnapshotRate,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            table: table.to_string(),
            code: rate.code.clone(),
            currency_name: rate.currency_name.clone(),
            mid_rate: normalize_mid_rate(&rate.code, rate.mid)?,
            effective_date,
        })
    }
}

/// Rounds to the stored scale and rejects values the store cannot hold.
pub fn normalize_mid_rate(code: &str, mid: Decimal) -> Result<Decimal, DomainError> {
    let mid = if mid.scale() > MID_RATE_SCALE {
        mid.round_dp_with_strategy(MID_RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
    } else {
        mid
    };

    let limit = Decimal::from(10_i64.pow(MID_RATE_INTEGER_DIGITS));
    if mid.abs().trunc() >= limit {
        return Err(DomainError::MidRateOutOfRange {
            code: code.to_string(),
            mid,
        });
    }

    Ok(mid)
}

/// Parses an effective date, dropping any time-of-day or offset it carries.
///
/// Accepts `2024-01-15`, `2024-01-15T10:30:00[.fff]`, `2024-01-15 10:30:00`
/// and RFC 3339 timestamps. The calendar date is taken as written.
pub fn parse_effective_date(raw: &str) -> Result<NaiveDate, DomainError> {
    let s = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    Err(DomainError::InvalidEffectiveDate(raw.to_string()))
}

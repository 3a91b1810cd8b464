//! Data Transfer Objects (DTOs) for query responses and cached results.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::CurrencyRate;

// ─────────────────────────────────────────────────────────────────────────────
// Query DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// One currency on one publication date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRateDto {
    pub code: String,
    pub currency_name: String,
    pub mid_rate: Decimal,
    pub effective_date: NaiveDate,
}

impl From<CurrencyRate> for CurrencyRateDto {
    fn from(rate: CurrencyRate) -> Self {
        Self {
            code: rate.code,
            currency_name: rate.currency_name,
            mid_rate: rate.mid_rate,
            effective_date: rate.effective_date,
        }
    }
}

/// One point of a currency's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateHistoryDto {
    pub date: NaiveDate,
    pub rate: Decimal,
}

impl From<CurrencyRate> for RateHistoryDto {
    fn from(rate: CurrencyRate) -> Self {
        Self {
            date: rate.effective_date,
            rate: rate.mid_rate,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cached query results
// ─────────────────────────────────────────────────────────────────────────────

/// Any value the query service keeps in its cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CachedQuery {
    Rates(Vec<CurrencyRateDto>),
    Dates(Vec<NaiveDate>),
    History(Vec<RateHistoryDto>),
}

impl CachedQuery {
    pub fn into_rates(self) -> Option<Vec<CurrencyRateDto>> {
        match self {
            CachedQuery::Rates(rates) => Some(rates),
            _ => None,
        }
    }

    pub fn into_dates(self) -> Option<Vec<NaiveDate>> {
        match self {
            CachedQuery::Dates(dates) => Some(dates),
            _ => None,
        }
    }

    pub fn into_history(self) -> Option<Vec<RateHistoryDto>> {
        match self {
            CachedQuery::History(points) => Some(points),
            _ => None,
        }
    }
}

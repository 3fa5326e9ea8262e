//! Data pipeline module for fetching price history, news and quant analysis
//! Every provider sits behind a trait so the signal pipeline can run against fakes

pub mod errors;
pub mod market;
pub mod news;
pub mod quant;

// Re-export commonly used types
pub use errors::{DataError, DataResult};
pub use market::{ChartPriceClient, PriceHistoryProvider};
pub use news::{FinnhubNewsClient, NewsProvider};
pub use quant::{QuantClient, QuantEngine};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of headlines forwarded to the decision prompt
pub const MAX_HEADLINES: usize = 5;

/// Text used when no headline could be fetched
pub const NO_NEWS_SENTINEL: &str = "No specific news found.";

/// Chronological daily closing prices, nulls already removed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub closes: Vec<f64>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, closes: Vec<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            closes,
        }
    }

    /// Build a series from raw provider values, dropping null and non-finite entries
    pub fn from_raw(symbol: impl Into<String>, raw: impl IntoIterator<Item = Option<f64>>) -> Self {
        let closes = raw
            .into_iter()
            .flatten()
            .filter(|p| p.is_finite())
            .collect();
        Self::new(symbol, closes)
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn last_price(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

/// Technical analysis text produced by the external quant engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalSummary(pub String);

impl TechnicalSummary {
    /// Substituted when the quant engine cannot be reached
    pub fn offline() -> Self {
        Self("Quantitative engine is offline. Proceeding with news only.".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TechnicalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recent headlines, most recent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Headlines {
    Items(Vec<String>),
    NoData,
}

impl Headlines {
    /// Keep at most [`MAX_HEADLINES`] non-blank headlines; an empty result collapses to `NoData`
    pub fn from_recent(headlines: impl IntoIterator<Item = String>) -> Self {
        let items: Vec<String> = headlines
            .into_iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .take(MAX_HEADLINES)
            .collect();

        if items.is_empty() {
            Headlines::NoData
        } else {
            Headlines::Items(items)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Headlines::Items(items) => items.len(),
            Headlines::NoData => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render for the decision prompt
    pub fn to_prompt_text(&self) -> String {
        match self {
            Headlines::Items(items) => items
                .iter()
                .map(|h| format!("- {}", h))
                .collect::<Vec<_>>()
                .join("\n"),
            Headlines::NoData => NO_NEWS_SENTINEL.to_string(),
        }
    }
}

/// Validation helpers
pub mod validation {
    use super::*;

    /// Validate and normalise a ticker symbol.
    /// Accepts letters, digits and the `.`, `-`, `^`, `=` separators used by index and class tickers.
    pub fn normalize_symbol(symbol: &str) -> DataResult<String> {
        let symbol = symbol.trim();

        if symbol.is_empty() {
            return Err(DataError::validation_error("symbol", "Symbol cannot be empty"));
        }

        if symbol.len() > 12 {
            return Err(DataError::validation_error("symbol", "Symbol too long (max 12 chars)"));
        }

        if !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
        {
            return Err(DataError::InvalidSymbol(symbol.to_string()));
        }

        Ok(symbol.to_ascii_uppercase())
    }
}

// Market quotes for the ledger
// Latest close per symbol, used to value portfolios and to sanity-check
// client-supplied trade prices.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::PriceHistoryProvider;

/// Short window: only the last close matters, but weekends and holidays must be covered
const QUOTE_LOOKBACK_DAYS: u32 = 7;

#[derive(Debug, Error, PartialEq)]
pub enum PriceCheckError {
    #[error("No current quote available for {symbol}")]
    QuoteUnavailable { symbol: String },

    #[error("Price ${price:.2} deviates {deviation_pct:.1}% from last close ${reference:.2} (limit {limit_pct:.1}%)")]
    PriceDeviation {
        price: f64,
        reference: f64,
        deviation_pct: f64,
        limit_pct: f64,
    },
}

pub struct QuoteService {
    provider: Arc<dyn PriceHistoryProvider>,
    max_deviation_pct: Option<f64>,
}

impl QuoteService {
    pub fn new(provider: Arc<dyn PriceHistoryProvider>, max_deviation_pct: Option<f64>) -> Self {
        Self {
            provider,
            max_deviation_pct,
        }
    }

    /// Last close for `symbol`, or None if the provider has nothing usable
    pub async fn latest_quote(&self, symbol: &str) -> Option<f64> {
        match self
            .provider
            .fetch_price_history(symbol, QUOTE_LOOKBACK_DAYS)
            .await
        {
            Ok(series) => series.last_price(),
            Err(e) => {
                warn!("Quote for {} unavailable: {}", symbol, e);
                None
            }
        }
    }

    /// Quotes for every symbol, fetched concurrently; misses are left out
    pub async fn latest_quotes(&self, symbols: &[String]) -> HashMap<String, f64> {
        let quotes = join_all(symbols.iter().map(|symbol| async move {
            (symbol.clone(), self.latest_quote(symbol).await)
        }))
        .await;

        quotes
            .into_iter()
            .filter_map(|(symbol, quote)| quote.map(|price| (symbol, price)))
            .collect()
    }

    /// Accept `price` if no limit is configured or it is within the limit of the last close
    pub async fn check_trade_price(&self, symbol: &str, price: f64) -> Result<(), PriceCheckError> {
        let Some(limit_pct) = self.max_deviation_pct else {
            return Ok(());
        };

        let reference =
            self.latest_quote(symbol)
                .await
                .ok_or_else(|| PriceCheckError::QuoteUnavailable {
                    symbol: symbol.to_string(),
                })?;

        check_deviation(price, reference, limit_pct)?;
        debug!("Trade price ${:.2} for {} within {:.1}% of ${:.2}", price, symbol, limit_pct, reference);
        Ok(())
    }
}

fn check_deviation(price: f64, reference: f64, limit_pct: f64) -> Result<(), PriceCheckError> {
    let deviation_pct = ((price - reference) / reference).abs() * 100.0;
    if deviation_pct > limit_pct {
        return Err(PriceCheckError::PriceDeviation {
            price,
            reference,
            deviation_pct,
            limit_pct,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataError, DataResult, PriceSeries};
    use async_trait::async_trait;

    struct FixedPrices(HashMap<String, f64>);

    #[async_trait]
    impl PriceHistoryProvider for FixedPrices {
        async fn fetch_price_history(&self, symbol: &str, _days: u32) -> DataResult<PriceSeries> {
            match self.0.get(symbol) {
                Some(price) => Ok(PriceSeries::new(symbol, vec![price - 1.0, *price])),
                None => Err(DataError::EmptyHistory {
                    symbol: symbol.to_string(),
                }),
            }
        }
    }

    fn service(limit: Option<f64>) -> QuoteService {
        let prices = HashMap::from([("AAPL".to_string(), 200.0)]);
        QuoteService::new(Arc::new(FixedPrices(prices)), limit)
    }

    #[tokio::test]
    async fn test_latest_quotes_skips_missing() {
        let quotes = service(None)
            .latest_quotes(&["AAPL".to_string(), "ZZZZ".to_string()])
            .await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes.get("AAPL"), Some(&200.0));
    }

    #[tokio::test]
    async fn test_no_limit_accepts_anything() {
        assert!(service(None).check_trade_price("ZZZZ", 1.0).await.is_ok());
    }

    #[tokio::test]
    async fn test_deviation_limit() {
        let guard = service(Some(5.0));
        assert!(guard.check_trade_price("AAPL", 209.0).await.is_ok());
        assert!(matches!(
            guard.check_trade_price("AAPL", 250.0).await,
            Err(PriceCheckError::PriceDeviation { .. })
        ));
        assert_eq!(
            guard.check_trade_price("ZZZZ", 10.0).await,
            Err(PriceCheckError::QuoteUnavailable {
                symbol: "ZZZZ".to_string()
            })
        );
    }
}

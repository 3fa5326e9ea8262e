use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::{DataError, DataResult, PriceSeries};
use crate::config::MarketConfig;

/// Daily closing-price history for a symbol
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// Fetch closes over the trailing `lookback_days` window, oldest first.
    ///
    /// An empty provider answer is an error (`EmptyHistory` / `NoData`), never an empty series.
    async fn fetch_price_history(&self, symbol: &str, lookback_days: u32) -> DataResult<PriceSeries>;
}

/// Chart API response structures
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Price history client for a Yahoo-style chart endpoint
pub struct ChartPriceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ChartPriceClient {
    pub fn new(config: &MarketConfig) -> DataResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("papertrader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.price_history_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceHistoryProvider for ChartPriceClient {
    async fn fetch_price_history(&self, symbol: &str, lookback_days: u32) -> DataResult<PriceSeries> {
        tracing::info!("Fetching price history for {} (last {} days)", symbol, lookback_days);

        if lookback_days == 0 {
            return Err(DataError::validation_error("lookback_days", "Lookback window must be positive"));
        }

        let end = Utc::now();
        let start = end - Duration::days(i64::from(lookback_days));

        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            self.base_url,
            urlencoding::encode(symbol),
            start.timestamp(),
            end.timestamp()
        );

        tracing::debug!("Chart API request: GET {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            tracing::error!("Chart API failed ({}): {}", status_code, error_text);
            return Err(DataError::api_error(status_code, error_text));
        }

        let body: ChartResponse = response.json().await?;
        let series = parse_chart(symbol, body)?;

        if series.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
                start: start.date_naive().to_string(),
                end: end.date_naive().to_string(),
            });
        }

        tracing::info!("Fetched {} daily closes for {}", series.len(), symbol);
        Ok(series)
    }
}

fn parse_chart(symbol: &str, body: ChartResponse) -> DataResult<PriceSeries> {
    if let Some(err) = body.chart.error {
        return Err(DataError::parse_error(format!(
            "Chart API error {}: {}",
            err.code.unwrap_or_else(|| "unknown".to_string()),
            err.description.unwrap_or_default()
        )));
    }

    let result = body
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| DataError::EmptyHistory {
            symbol: symbol.to_string(),
        })?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    if closes.is_empty() {
        return Err(DataError::EmptyHistory {
            symbol: symbol.to_string(),
        });
    }

    Ok(PriceSeries::from_raw(symbol, closes))
}

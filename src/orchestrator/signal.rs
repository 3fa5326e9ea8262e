//! Signal orchestrator
//! Coordinates the pipeline: (price history ∥ news) → quant → AI → signal.
//!
//! Only a price-history failure ends the request early (UNKNOWN); news, quant
//! and AI failures each degrade to a fixed substitute. Every stage is bounded
//! by a timeout, and dropping the returned future cancels whatever is in flight.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::synthesizer::{AiDecision, DecisionSynthesizer};
use crate::config::Config;
use crate::data::{
    DataError, DataResult, Headlines, NewsProvider, PriceHistoryProvider, PriceSeries,
    QuantEngine, TechnicalSummary,
};

pub const NOTE_DATA_ERROR: &str = "Data Error";
pub const NOTE_QUANT_GENAI: &str = "Quant + GenAI";
pub const INSIGHT_DATA_ERROR: &str = "• Unable to fetch market data.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalDecision {
    Buy,
    Sell,
    Hold,
    /// Reserved for a failed market-data fetch
    Unknown,
}

impl fmt::Display for SignalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDecision::Buy => write!(f, "BUY"),
            SignalDecision::Sell => write!(f, "SELL"),
            SignalDecision::Hold => write!(f, "HOLD"),
            SignalDecision::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Per-request signal, never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalResult {
    pub symbol: String,
    pub signal: SignalDecision,
    pub insight: String,
    pub note: String,
}

impl SignalResult {
    pub fn data_error(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            signal: SignalDecision::Unknown,
            insight: INSIGHT_DATA_ERROR.to_string(),
            note: NOTE_DATA_ERROR.to_string(),
        }
    }

    pub fn from_decision(symbol: &str, decision: AiDecision) -> Self {
        Self {
            symbol: symbol.to_string(),
            signal: decision.decision,
            insight: decision.reason,
            note: NOTE_QUANT_GENAI.to_string(),
        }
    }
}

/// Pipeline position, used for log context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    FetchingMarketData,
    FetchingQuant,
    FetchingAI,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::FetchingMarketData => "fetching_market_data",
            PipelineStage::FetchingQuant => "fetching_quant",
            PipelineStage::FetchingAI => "fetching_ai",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Lookback windows and per-stage timeouts
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub price_lookback_days: u32,
    pub news_lookback_days: u32,
    pub market_timeout: Duration,
    pub quant_timeout: Duration,
    pub ai_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            price_lookback_days: config.market.price_lookback_days,
            news_lookback_days: config.market.news_lookback_days,
            market_timeout: Duration::from_secs(config.market.timeout_seconds),
            quant_timeout: Duration::from_secs(config.quant.timeout_seconds),
            ai_timeout: Duration::from_secs(config.llm.timeout_seconds),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct SignalOrchestrator {
    prices: Arc<dyn PriceHistoryProvider>,
    news: Arc<dyn NewsProvider>,
    quant: Arc<dyn QuantEngine>,
    synthesizer: DecisionSynthesizer,
    settings: PipelineSettings,
}

impl SignalOrchestrator {
    pub fn new(
        prices: Arc<dyn PriceHistoryProvider>,
        news: Arc<dyn NewsProvider>,
        quant: Arc<dyn QuantEngine>,
        synthesizer: DecisionSynthesizer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            prices,
            news,
            quant,
            synthesizer,
            settings,
        }
    }

    /// Shared price provider, also used for portfolio quotes
    pub fn price_provider(&self) -> Arc<dyn PriceHistoryProvider> {
        Arc::clone(&self.prices)
    }

    /// Run the full pipeline for an already-validated symbol
    pub async fn generate_signal(&self, symbol: &str) -> SignalResult {
        let span = tracing::info_span!("signal", %symbol, request_id = %Uuid::new_v4());
        self.run(symbol).instrument(span).await
    }

    async fn run(&self, symbol: &str) -> SignalResult {
        info!(stage = %PipelineStage::FetchingMarketData, "Starting signal pipeline for {}", symbol);

        let (series, headlines) = tokio::join!(
            self.fetch_prices(symbol),
            self.fetch_headlines(symbol)
        );

        let series = match series {
            Ok(series) if !series.is_empty() => series,
            Ok(_) => {
                warn!("Price history for {} was empty after filtering", symbol);
                return SignalResult::data_error(symbol);
            }
            Err(e) => {
                if e.is_empty_result() {
                    warn!("No price history available for {}: {}", symbol, e);
                } else {
                    warn!("Price history fetch failed for {}: {}", symbol, e);
                }
                return SignalResult::data_error(symbol);
            }
        };

        info!(stage = %PipelineStage::FetchingQuant, "{} closes, {} headlines", series.len(), headlines.len());
        let summary = self.fetch_summary(&series).await;

        // Non-empty series checked above
        let current_price = series.last_price().unwrap_or_default();

        info!(stage = %PipelineStage::FetchingAI, "Requesting AI decision at ${:.2}", current_price);
        let decision = self
            .synthesizer
            .decide(symbol, &summary, &headlines, current_price)
            .await;

        let result = SignalResult::from_decision(symbol, decision);
        info!(stage = %PipelineStage::Done, signal = %result.signal, "Signal pipeline complete for {}", symbol);
        result
    }

    async fn fetch_prices(&self, symbol: &str) -> DataResult<PriceSeries> {
        let lookback = self.settings.price_lookback_days;
        match timeout(
            self.settings.market_timeout,
            self.prices.fetch_price_history(symbol, lookback),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DataError::Timeout {
                timeout_seconds: self.settings.market_timeout.as_secs(),
            }),
        }
    }

    async fn fetch_headlines(&self, symbol: &str) -> Headlines {
        let since = self.settings.news_lookback_days;
        match timeout(
            self.settings.market_timeout,
            self.news.fetch_headlines(symbol, since),
        )
        .await
        {
            Ok(headlines) => headlines,
            Err(_) => {
                warn!("News fetch timed out for {}, using sentinel", symbol);
                Headlines::NoData
            }
        }
    }

    async fn fetch_summary(&self, series: &PriceSeries) -> TechnicalSummary {
        match timeout(self.settings.quant_timeout, self.quant.analyze(series)).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                warn!("Quant engine failed: {}, continuing without technicals", e);
                TechnicalSummary::offline()
            }
            Err(_) => {
                warn!(
                    "Quant engine timed out after {:?}, continuing without technicals",
                    self.settings.quant_timeout
                );
                TechnicalSummary::offline()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_result_wire_shape() {
        let result = SignalResult::data_error("TSLA");
        let json = serde_json::to_value(&result).expect("serializes");
        assert_eq!(
            json,
            serde_json::json!({
                "symbol": "TSLA",
                "signal": "UNKNOWN",
                "insight": "• Unable to fetch market data.",
                "note": "Data Error"
            })
        );
    }

    #[test]
    fn test_decision_display_matches_wire() {
        for decision in [
            SignalDecision::Buy,
            SignalDecision::Sell,
            SignalDecision::Hold,
            SignalDecision::Unknown,
        ] {
            let wire = serde_json::to_value(decision).expect("serializes");
            assert_eq!(wire, serde_json::Value::String(decision.to_string()));
        }
    }
}

//! Orchestrator module for the trading-signal pipeline
//! Combines price history, news, quant analysis and LLM arbitration

pub mod signal;
pub mod synthesizer;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::data::{ChartPriceClient, FinnhubNewsClient, QuantClient};
use crate::llm::{LLMClient, LlmProvider};

// Re-export main types
pub use signal::{PipelineSettings, PipelineStage, SignalDecision, SignalOrchestrator, SignalResult};
pub use synthesizer::{AiDecision, DecisionSynthesizer};

/// Wire the production HTTP clients into an orchestrator
pub fn build_orchestrator(config: &Config) -> Result<SignalOrchestrator> {
    let prices = Arc::new(ChartPriceClient::new(&config.market)?);
    let news = Arc::new(FinnhubNewsClient::new(
        &config.market,
        config.apis.finnhub_api_key.clone(),
    )?);
    let quant = Arc::new(QuantClient::new(&config.quant)?);
    let llm = Arc::new(LLMClient::from_config(config)?);
    tracing::info!("Signal pipeline using {:?} model '{}'", llm.provider(), llm.model());

    if config.apis.finnhub_api_key.is_none() {
        tracing::warn!("FINNHUB_API_KEY not set; signals will run without news");
    }
    if missing_gemini_key(llm.provider(), config) {
        tracing::warn!("GEMINI_API_KEY not set; signals will use the HOLD fallback");
    }

    let synthesizer =
        DecisionSynthesizer::new(llm, Duration::from_secs(config.llm.timeout_seconds));

    Ok(SignalOrchestrator::new(
        prices,
        news,
        quant,
        synthesizer,
        PipelineSettings::from_config(config),
    ))
}

fn missing_gemini_key(provider: LlmProvider, config: &Config) -> bool {
    provider == LlmProvider::Gemini && config.apis.gemini_api_key.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_gemini_key_ignores_provider_case() {
        let mut config = Config::default();
        config.apis.gemini_api_key = None;
        config.llm.provider = "Gemini".to_string();
        let llm = LLMClient::from_config(&config).expect("client builds");
        assert!(missing_gemini_key(llm.provider(), &config));

        config.llm.provider = "OLLAMA".to_string();
        let llm = LLMClient::from_config(&config).expect("client builds");
        assert!(!missing_gemini_key(llm.provider(), &config));

        config.apis.gemini_api_key = Some("key".to_string());
        assert!(!missing_gemini_key(LlmProvider::Gemini, &config));
    }
}

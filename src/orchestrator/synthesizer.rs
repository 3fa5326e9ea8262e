//! AI decision synthesizer
//! Turns technical summary + headlines + price into a validated BUY/SELL/HOLD decision.
//! Every failure path collapses to the fixed HOLD fallback.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use super::signal::SignalDecision;
use crate::data::{Headlines, TechnicalSummary};
use crate::llm::{parse_json_response, DecisionPrompts, TextGenerator};

/// Number of bullet lines required in `reason`
pub const REASON_LINES: usize = 4;

/// Prefix every reason line must carry
pub const BULLET: &str = "• ";

/// Reason returned whenever the model cannot be used
pub const FALLBACK_REASON: &str = "• AI analysis temporarily unavailable.\n• Review manual indicators.\n• Check news feed manually.\n• Monitor volatility.";

/// Validated model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiDecision {
    pub decision: SignalDecision,
    pub reason: String,
}

impl AiDecision {
    pub fn fallback() -> Self {
        Self {
            decision: SignalDecision::Hold,
            reason: FALLBACK_REASON.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.decision == SignalDecision::Hold && self.reason == FALLBACK_REASON
    }
}

/// Raw wire shape; anything beyond these two fields is a schema violation
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDecision {
    decision: String,
    reason: String,
}

/// Check the decision enum and the exact 4-bullet reason format
fn validate(raw: RawDecision) -> Result<AiDecision> {
    let decision = match raw.decision.trim() {
        "BUY" => SignalDecision::Buy,
        "SELL" => SignalDecision::Sell,
        "HOLD" => SignalDecision::Hold,
        other => bail!("decision '{}' is not one of BUY, SELL, HOLD", other),
    };

    let lines: Vec<&str> = raw
        .reason
        .trim()
        .split('\n')
        .map(|line| line.trim_end_matches('\r').trim_end())
        .collect();

    if lines.len() != REASON_LINES {
        bail!("reason has {} lines, expected {}", lines.len(), REASON_LINES);
    }

    for (i, line) in lines.iter().enumerate() {
        let body = line
            .strip_prefix(BULLET)
            .with_context(|| format!("reason line {} does not start with '{}'", i + 1, BULLET))?;
        if body.trim().is_empty() {
            bail!("reason line {} is empty", i + 1);
        }
    }

    Ok(AiDecision {
        decision,
        reason: lines.join("\n"),
    })
}

/// Parse and validate a raw model response
pub fn parse_decision(text: &str) -> Result<AiDecision> {
    let raw: RawDecision = parse_json_response(text)?;
    validate(raw)
}

pub struct DecisionSynthesizer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl DecisionSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Always returns a structurally valid decision
    pub async fn decide(
        &self,
        symbol: &str,
        technical_summary: &TechnicalSummary,
        headlines: &Headlines,
        current_price: f64,
    ) -> AiDecision {
        match timeout(
            self.timeout,
            self.try_decide(symbol, technical_summary, headlines, current_price),
        )
        .await
        {
            Ok(Ok(decision)) => {
                info!("AI decision for {}: {}", symbol, decision.decision);
                decision
            }
            Ok(Err(e)) => {
                warn!("AI synthesis failed for {}: {:#}, using HOLD fallback", symbol, e);
                AiDecision::fallback()
            }
            Err(_) => {
                warn!(
                    "AI synthesis timed out for {} after {:?}, using HOLD fallback",
                    symbol, self.timeout
                );
                AiDecision::fallback()
            }
        }
    }

    async fn try_decide(
        &self,
        symbol: &str,
        technical_summary: &TechnicalSummary,
        headlines: &Headlines,
        current_price: f64,
    ) -> Result<AiDecision> {
        let prompt =
            DecisionPrompts::trading_decision(symbol, technical_summary, headlines, current_price);

        let response = self
            .generator
            .generate(&prompt)
            .await
            .context("Failed to get LLM response for trading decision")?;

        parse_decision(&response.content).context("LLM response violated the decision schema")
    }
}

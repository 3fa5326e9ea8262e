//! Prompt templates for the trading decision
//! The model acts as a portfolio manager weighing indicators against news

use crate::data::{Headlines, TechnicalSummary};

/// Prompt template builder
pub struct DecisionPrompts;

impl DecisionPrompts {
    /// Decision prompt constrained to the two-field JSON schema
    pub fn trading_decision(
        symbol: &str,
        technical_summary: &TechnicalSummary,
        headlines: &Headlines,
        current_price: f64,
    ) -> String {
        format!(
            r#"Role: Senior Portfolio Manager.
Task: Make a trading decision for {symbol} (Current Price: ${price:.2}).

INPUT DATA:
1. QUANTITATIVE ANALYSIS:
{technical}

2. MARKET SENTIMENT (News):
{news}

INSTRUCTIONS:
- Weigh the hard math (SMA, RSI, Bollinger Bands) against the soft news.
- If RSI is above 70 (overbought) but the news is strongly positive, you may still HOLD.
- If RSI is below 30 (oversold) and the news is negative, you may still SELL.
- If the quantitative analysis is unavailable, decide from the news and price alone.

OUTPUT SCHEMA:
Return a JSON object with exactly these two fields:
- decision: "BUY", "SELL", or "HOLD"
- reason: a single string containing exactly 4 bullet points separated by newlines (\n). Start each bullet with "• ".

Respond with the JSON object only."#,
            symbol = symbol,
            price = current_price,
            technical = technical_summary.as_str().trim_end(),
            news = headlines.to_prompt_text(),
        )
    }
}

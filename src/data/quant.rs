use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DataError, DataResult, PriceSeries, TechnicalSummary};
use crate::config::QuantConfig;

/// External technical-analysis engine
#[async_trait]
pub trait QuantEngine: Send + Sync {
    async fn analyze(&self, series: &PriceSeries) -> DataResult<TechnicalSummary>;
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    prices: &'a [f64],
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    technical_analysis: Option<String>,
}

/// HTTP client for the quant engine's `/analyze` endpoint
pub struct QuantClient {
    http_client: reqwest::Client,
    service_url: String,
}

impl QuantClient {
    pub fn new(config: &QuantConfig) -> DataResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            service_url: config.service_url.clone(),
        })
    }
}

fn summary_from_body(body: AnalyzeResponse) -> DataResult<TechnicalSummary> {
    match body.technical_analysis {
        Some(text) if !text.trim().is_empty() => Ok(TechnicalSummary(text)),
        _ => Err(DataError::parse_error("Quant response missing technical_analysis")),
    }
}

#[async_trait]
impl QuantEngine for QuantClient {
    async fn analyze(&self, series: &PriceSeries) -> DataResult<TechnicalSummary> {
        tracing::info!(
            "Requesting technical analysis for {} ({} closes)",
            series.symbol,
            series.len()
        );

        let response = self
            .http_client
            .post(&self.service_url)
            .json(&AnalyzeRequest {
                prices: &series.closes,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DataError::api_error(status_code, error_text));
        }

        let body: AnalyzeResponse = response.json().await?;
        summary_from_body(body)
    }
}

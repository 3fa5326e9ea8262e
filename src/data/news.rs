use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::{DataError, DataResult, Headlines};
use crate::config::MarketConfig;

/// Best-effort headline source. Never fails: provider errors collapse to [`Headlines::NoData`].
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch_headlines(&self, symbol: &str, since_days: u32) -> Headlines;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyNewsItem {
    #[serde(default)]
    pub headline: String,
    /// Unix seconds
    #[serde(default)]
    pub datetime: i64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Company-news client for the Finnhub API
pub struct FinnhubNewsClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FinnhubNewsClient {
    pub fn new(config: &MarketConfig, api_key: Option<String>) -> DataResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("papertrader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.news_api_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fetch raw company news for the trailing window
    async fn fetch_company_news(&self, symbol: &str, since_days: u32) -> DataResult<Vec<CompanyNewsItem>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| DataError::Config("FINNHUB_API_KEY not configured".to_string()))?;

        let to = Utc::now().date_naive();
        let from = to - Duration::days(i64::from(since_days));

        let url = format!(
            "{}/company-news?symbol={}&from={}&to={}&token={}",
            self.base_url,
            urlencoding::encode(symbol),
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
            api_key
        );

        tracing::debug!("Company news request: GET {}", url.replace(api_key.as_str(), "***"));

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DataError::api_error(
                status.as_u16(),
                format!("Finnhub error: {}", error_text),
            ));
        }

        let items: Vec<CompanyNewsItem> = response.json().await?;
        Ok(items)
    }
}

/// Sort newest first and keep the top headlines
pub fn select_recent(mut items: Vec<CompanyNewsItem>) -> Headlines {
    items.sort_by(|a, b| b.datetime.cmp(&a.datetime));
    Headlines::from_recent(items.into_iter().map(|item| item.headline))
}

#[async_trait]
impl NewsProvider for FinnhubNewsClient {
    async fn fetch_headlines(&self, symbol: &str, since_days: u32) -> Headlines {
        tracing::info!("Fetching news for {} (last {} days)", symbol, since_days);

        match self.fetch_company_news(symbol, since_days).await {
            Ok(items) => {
                let headlines = select_recent(items);
                tracing::info!("Selected {} headlines for {}", headlines.len(), symbol);
                headlines
            }
            Err(e) => {
                tracing::warn!("News fetch failed for {}: {}, using sentinel", symbol, e);
                Headlines::NoData
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(headline: &str, datetime: i64) -> CompanyNewsItem {
        CompanyNewsItem {
            headline: headline.to_string(),
            datetime,
            source: None,
            url: None,
        }
    }

    #[test]
    fn test_select_recent_orders_newest_first() {
        let items = vec![item("old", 100), item("newest", 300), item("middle", 200)];
        assert_eq!(
            select_recent(items),
            Headlines::Items(vec!["newest".into(), "middle".into(), "old".into()])
        );
    }

    #[test]
    fn test_select_recent_caps_at_five() {
        let items = (0..9).map(|i| item(&format!("h{}", i), i)).collect();
        match select_recent(items) {
            Headlines::Items(h) => {
                assert_eq!(h.len(), 5);
                assert_eq!(h[0], "h8");
            }
            Headlines::NoData => panic!("expected headlines"),
        }
    }

    #[test]
    fn test_company_news_deserializes() {
        let items: Vec<CompanyNewsItem> = serde_json::from_str(
            r#"[{"category":"company","datetime":1700000000,"headline":"Apple beats","id":1,
                "image":"","related":"AAPL","source":"Reuters","summary":"","url":"https://x"}]"#,
        )
        .expect("valid fixture");
        assert_eq!(items[0].headline, "Apple beats");
    }

    #[tokio::test]
    async fn test_missing_key_yields_sentinel() {
        let client = FinnhubNewsClient::new(&crate::config::Config::default().market, None)
            .expect("client builds");
        assert_eq!(client.fetch_headlines("AAPL", 7).await, Headlines::NoData);
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub apis: ApiConfig,
    pub llm: LlmConfig,
    pub market: MarketConfig,
    pub quant: QuantConfig,
    pub trading: TradingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Account store. When unset the server runs on the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub finnhub_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String, // "gemini" or "ollama"
    pub gemini_base_url: String,
    pub ollama_url: String,
    pub primary_model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub price_history_url: String,
    pub news_api_url: String,
    pub price_lookback_days: u32,
    pub news_lookback_days: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantConfig {
    pub service_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub starting_cash: f64,
    pub max_commit_attempts: usize,
    /// Reject trades priced further than this from the last close (percent).
    pub max_price_deviation_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

fn parse_var<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid {} value", key))
}

fn parse_optional_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid {} value", key)),
        _ => Ok(None),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file - this sets env vars that aren't already set
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            database: DatabaseConfig {
                url: non_empty_var("DATABASE_URL"),
                max_connections: parse_var("DB_MAX_CONNECTIONS", "5")?,
                min_connections: parse_var("DB_MIN_CONNECTIONS", "1")?,
            },
            apis: ApiConfig {
                finnhub_api_key: non_empty_var("FINNHUB_API_KEY"),
                gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            },
            llm: LlmConfig {
                provider: env::var("LLM_PROVIDER").unwrap_or(defaults.llm.provider),
                gemini_base_url: env::var("GEMINI_BASE_URL")
                    .unwrap_or(defaults.llm.gemini_base_url),
                ollama_url: env::var("OLLAMA_URL").unwrap_or(defaults.llm.ollama_url),
                primary_model: env::var("PRIMARY_MODEL").unwrap_or(defaults.llm.primary_model),
                timeout_seconds: parse_var("LLM_TIMEOUT_SECONDS", "30")?,
            },
            market: MarketConfig {
                price_history_url: env::var("PRICE_HISTORY_URL")
                    .unwrap_or(defaults.market.price_history_url),
                news_api_url: env::var("NEWS_API_URL").unwrap_or(defaults.market.news_api_url),
                price_lookback_days: parse_var("PRICE_LOOKBACK_DAYS", "60")?,
                news_lookback_days: parse_var("NEWS_LOOKBACK_DAYS", "7")?,
                timeout_seconds: parse_var("MARKET_TIMEOUT_SECONDS", "10")?,
            },
            quant: QuantConfig {
                service_url: env::var("QUANT_SERVICE_URL").unwrap_or(defaults.quant.service_url),
                timeout_seconds: parse_var("QUANT_TIMEOUT_SECONDS", "10")?,
            },
            trading: TradingConfig {
                starting_cash: parse_var("STARTING_CASH", "100000")?,
                max_commit_attempts: parse_var("MAX_COMMIT_ATTEMPTS", "5")?,
                max_price_deviation_pct: parse_optional_var("MAX_PRICE_DEVIATION_PCT")?,
            },
            server: ServerConfig {
                port: parse_var("PORT", "5000")?,
            },
        };

        if config.trading.starting_cash < 0.0 {
            anyhow::bail!("STARTING_CASH cannot be negative");
        }
        if config.market.price_lookback_days == 0 {
            anyhow::bail!("PRICE_LOOKBACK_DAYS must be positive");
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                min_connections: 1,
            },
            apis: ApiConfig {
                finnhub_api_key: None,
                gemini_api_key: None,
            },
            llm: LlmConfig {
                provider: "gemini".to_string(),
                gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                ollama_url: "http://localhost:11434".to_string(),
                primary_model: "gemini-2.5-flash".to_string(),
                timeout_seconds: 30,
            },
            market: MarketConfig {
                price_history_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
                news_api_url: "https://finnhub.io/api/v1".to_string(),
                price_lookback_days: 60,
                news_lookback_days: 7,
                timeout_seconds: 10,
            },
            quant: QuantConfig {
                service_url: "http://127.0.0.1:8080/analyze".to_string(),
                timeout_seconds: 10,
            },
            trading: TradingConfig {
                starting_cash: 100_000.0,
                max_commit_attempts: 5,
                max_price_deviation_pct: None,
            },
            server: ServerConfig { port: 5000 },
        }
    }
}

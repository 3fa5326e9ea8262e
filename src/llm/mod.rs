//! LLM integration module for Gemini (hosted) and Ollama (local)
//! Provides a single text-generation seam with explicit timeouts and error handling

pub mod prompts;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_rs::{generation::completion::request::GenerationRequest, Ollama};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};
use url::Url;

pub use prompts::DecisionPrompts;

/// LLM response with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: Option<usize>,
    pub completion_tokens: Option<usize>,
    pub total_tokens: Option<usize>,
}

/// Anything that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<LLMResponse>;
}

/// LLM client configuration
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub provider: LlmProvider,
    pub gemini_base_url: String,
    pub gemini_api_key: Option<String>,
    pub ollama_url: String,
    pub primary_model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(anyhow::anyhow!("Unknown LLM provider '{}' (use gemini or ollama)", other)),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            primary_model: "gemini-2.5-flash".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Gemini {
        http_client: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
    },
    Ollama(Ollama),
}

/// Gemini generateContent response structures
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: Option<usize>,
    candidates_token_count: Option<usize>,
    total_token_count: Option<usize>,
}

/// LLM client dispatching to the configured provider
#[derive(Debug, Clone)]
pub struct LLMClient {
    backend: Backend,
    config: LLMConfig,
}

impl LLMClient {
    /// Create new LLM client. No network call is made here.
    pub fn new(config: LLMConfig) -> Result<Self> {
        let backend = match config.provider {
            LlmProvider::Gemini => Backend::Gemini {
                http_client: reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.timeout_seconds))
                    .build()
                    .context("Failed to build HTTP client for Gemini")?,
                base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
                api_key: config.gemini_api_key.clone(),
            },
            LlmProvider::Ollama => {
                let parsed_url = Url::parse(&config.ollama_url).context("Invalid Ollama URL")?;
                let host = parsed_url
                    .host_str()
                    .ok_or_else(|| anyhow::anyhow!("No host in Ollama URL"))?;
                let port = parsed_url.port().unwrap_or(11434);
                Backend::Ollama(Ollama::new(format!("{}://{}", parsed_url.scheme(), host), port))
            }
        };

        Ok(Self { backend, config })
    }

    /// Create client from config::Config
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let llm_config = LLMConfig {
            provider: config.llm.provider.parse()?,
            gemini_base_url: config.llm.gemini_base_url.clone(),
            gemini_api_key: config.apis.gemini_api_key.clone(),
            ollama_url: config.llm.ollama_url.clone(),
            primary_model: config.llm.primary_model.clone(),
            timeout_seconds: config.llm.timeout_seconds,
        };

        Self::new(llm_config)
    }

    pub fn model(&self) -> &str {
        &self.config.primary_model
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    async fn generate_gemini(
        &self,
        http_client: &reqwest::Client,
        base_url: &str,
        api_key: Option<&str>,
        prompt: &str,
    ) -> Result<LLMResponse> {
        let api_key = api_key.ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY not configured"))?;
        let url = format!("{}/models/{}:generateContent", base_url, self.config.primary_model);

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response = http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .context("Failed to decode Gemini response")?;

        let content = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(anyhow::anyhow!("Gemini returned no candidate text"));
        }

        let usage = parsed.usage_metadata;
        Ok(LLMResponse {
            content,
            model: self.config.primary_model.clone(),
            prompt_tokens: usage.as_ref().and_then(|u| u.prompt_token_count),
            completion_tokens: usage.as_ref().and_then(|u| u.candidates_token_count),
            total_tokens: usage.as_ref().and_then(|u| u.total_token_count),
        })
    }

    async fn generate_ollama(&self, ollama: &Ollama, prompt: &str) -> Result<LLMResponse> {
        let enhanced_prompt = format!(
            "{}\n\nPlease respond with valid JSON only. Do not include any explanation or markdown formatting.",
            prompt
        );
        let request = GenerationRequest::new(self.config.primary_model.clone(), enhanced_prompt);
        let response = ollama
            .generate(request)
            .await
            .map_err(|e| anyhow::anyhow!("Ollama API error: {}", e))?;

        Ok(LLMResponse {
            content: response.response,
            model: self.config.primary_model.clone(),
            prompt_tokens: None, // Ollama doesn't provide token counts
            completion_tokens: None,
            total_tokens: None,
        })
    }
}

#[async_trait]
impl TextGenerator for LLMClient {
    /// Generate text with the configured model, bounded by the configured timeout
    async fn generate(&self, prompt: &str) -> Result<LLMResponse> {
        info!(
            "Generating text with model '{}' (prompt length: {} chars)",
            self.config.primary_model,
            prompt.len()
        );

        let call = async {
            match &self.backend {
                Backend::Gemini {
                    http_client,
                    base_url,
                    api_key,
                } => {
                    self.generate_gemini(http_client, base_url, api_key.as_deref(), prompt)
                        .await
                }
                Backend::Ollama(ollama) => self.generate_ollama(ollama, prompt).await,
            }
        };

        match timeout(Duration::from_secs(self.config.timeout_seconds), call).await {
            Ok(Ok(response)) => {
                info!(
                    "Generated {} chars with model '{}'",
                    response.content.len(),
                    response.model
                );
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!("LLM generation failed: {}", e);
                Err(e)
            }
            Err(_) => {
                error!("LLM timeout after {} seconds", self.config.timeout_seconds);
                Err(anyhow::anyhow!(
                    "Request timeout after {} seconds",
                    self.config.timeout_seconds
                ))
            }
        }
    }
}

/// Remove a surrounding markdown code fence (```json ... ``` or ``` ... ```)
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop an optional language tag on the opening fence line
    let rest = match rest.find('\n') {
        Some(newline) if !rest[..newline].trim().contains(['{', '[']) => &rest[newline + 1..],
        _ => rest.trim_start_matches("json"),
    };

    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Parse a model response as JSON after stripping code fences
pub fn parse_json_response<T>(text: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_str(strip_code_fences(text)).context("Failed to parse JSON response")
}

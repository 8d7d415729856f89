//! Completion clients for the supported providers.
//!
//! The [`CompletionClient`] trait is the single seam between the engine and
//! the model: one blocking call, one reply body. Provider selection happens
//! once at startup via [`build_client`]. Tests use scripted clients that
//! return predetermined replies.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::io::config::{EngineConfig, Provider};

/// One structured prompt: a system instruction plus the user message.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

/// Blocking completion seam. Implementations return the raw reply text.
pub trait CompletionClient {
    fn generate(&self, request: &CompletionRequest) -> Result<String>;
}

/// Build the configured provider client, reading the API key from the
/// environment variable named in config.
pub fn build_client(cfg: &EngineConfig) -> Result<Box<dyn CompletionClient>> {
    let api_key = std::env::var(&cfg.api_key_env)
        .with_context(|| format!("read API key from ${}", cfg.api_key_env))?;
    let http = http_client(cfg.llm_timeout_secs)?;
    let base_url = cfg.base_url().trim_end_matches('/').to_string();
    let model = cfg.model.clone();

    Ok(match cfg.provider {
        Provider::OpenAi => Box::new(OpenAiClient {
            http,
            base_url,
            model,
            api_key,
        }),
        Provider::Anthropic => Box::new(AnthropicClient {
            http,
            base_url,
            model,
            api_key,
            max_tokens: cfg.max_tokens,
        }),
        Provider::Gemini => Box::new(GeminiClient {
            http,
            base_url,
            model,
            api_key,
        }),
    })
}

/// No request timeout unless configured; the engine has no way to resume a
/// half-finished call.
fn http_client(timeout_secs: Option<u64>) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout_secs.map(Duration::from_secs))
        .build()
        .context("build http client")
}

/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl CompletionClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model))]
    fn generate(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
        });
        let body = post_json(self.http.post(&url).bearer_auth(&self.api_key), &payload)?;
        extract_text(&body, &["choices", "0", "message", "content"])
    }
}

/// Anthropic messages endpoint.
pub struct AnthropicClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

impl CompletionClient for AnthropicClient {
    #[instrument(skip_all, fields(model = %self.model))]
    fn generate(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        let payload = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": request.system,
            "messages": [{"role": "user", "content": request.user}],
        });
        let body = post_json(
            self.http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
            &payload,
        )?;
        extract_text(&body, &["content", "0", "text"])
    }
}

/// Gemini generateContent endpoint.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl CompletionClient for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model))]
    fn generate(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let payload = json!({
            "system_instruction": {"parts": [{"text": request.system}]},
            "contents": [{"role": "user", "parts": [{"text": request.user}]}],
        });
        let body = post_json(self.http.post(&url), &payload)?;
        extract_text(&body, &["candidates", "0", "content", "parts", "0", "text"])
    }
}

fn post_json(builder: reqwest::blocking::RequestBuilder, payload: &Value) -> Result<Value> {
    let response = builder
        .json(payload)
        .send()
        .context("send completion request")?;

    let status = response.status();
    let body = response.text().context("read completion response body")?;
    if !status.is_success() {
        let snippet: String = body.chars().take(400).collect();
        return Err(anyhow!("completion request failed: {status}: {snippet}"));
    }
    debug!(bytes = body.len(), "completion reply received");
    serde_json::from_str(&body).context("parse completion response json")
}

/// Walk a JSON path of object keys and array indexes to the reply text.
fn extract_text(body: &Value, path: &[&str]) -> Result<String> {
    let mut current = body;
    for key in path {
        current = match key.parse::<usize>() {
            Ok(index) => current.get(index),
            Err(_) => current.get(*key),
        }
        .ok_or_else(|| anyhow!("completion response missing field '{key}'"))?;
    }
    current
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("completion response text field is not a string"))
}

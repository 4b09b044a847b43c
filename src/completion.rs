//! Completion provider abstraction and implementations.
//!
//! Defines the [`Completer`] trait and concrete backends:
//! - **[`OpenAiCompleter`]** — calls `POST /v1/chat/completions`.
//! - **[`OllamaCompleter`]** — calls an Ollama instance's `/api/generate`.
//!
//! Both use the same retry/backoff discipline as the embedding backends
//! (retry 429/5xx/network, fail fast on other 4xx). An empty or malformed
//! response body is an error: the QA engine never persists a blank answer.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CompletionConfig;

/// Trait for text completion providers.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;
    /// Generate a completion for the prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Create the configured [`Completer`].
pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn Completer>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompleter::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaCompleter::new(config)?)),
        "disabled" => {
            bail!("Completion provider is disabled. Set [completion] provider in config.")
        }
        other => bail!("Unknown completion provider: {}", other),
    }
}

// ============ OpenAI ============

/// Completion provider using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set. The
/// configured temperature defaults to 0 so answers stay grounded in the
/// supplied context.
pub struct OpenAiCompleter {
    model: String,
    url: String,
    api_key: String,
    temperature: f64,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            url,
            api_key,
            temperature: config.temperature,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/v1/chat/completions", self.url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_openai_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion failed after retries")))
    }
}

/// Extract `choices[0].message.content` from a chat completions response.
fn parse_openai_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

    if content.trim().is_empty() {
        bail!("OpenAI returned an empty completion");
    }

    Ok(content.to_string())
}

// ============ Ollama ============

/// Completion provider using an Ollama instance's `/api/generate` endpoint
/// (non-streaming).
pub struct OllamaCompleter {
    model: String,
    url: String,
    temperature: f64,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            url,
            temperature: config.temperature,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/generate", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_ollama_generate_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("Ollama API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama completion failed after retries")))
    }
}

fn parse_ollama_generate_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("response")
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))?;

    if content.trim().is_empty() {
        bail!("Ollama returned an empty completion");
    }

    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_chat_response() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "The Eiffel Tower." } }
            ]
        });
        assert_eq!(
            parse_openai_chat_response(&json).unwrap(),
            "The Eiffel Tower."
        );
    }

    #[test]
    fn test_parse_openai_chat_response_empty_is_error() {
        let json = serde_json::json!({
            "choices": [ { "message": { "content": "   " } } ]
        });
        assert!(parse_openai_chat_response(&json).is_err());
    }

    #[test]
    fn test_parse_openai_chat_response_malformed() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_openai_chat_response(&json).is_err());
    }

    #[test]
    fn test_parse_ollama_generate_response() {
        let json = serde_json::json!({ "response": "Paris." });
        assert_eq!(parse_ollama_generate_response(&json).unwrap(), "Paris.");
    }

    #[test]
    fn test_create_completer_rejects_disabled() {
        let config = CompletionConfig::default();
        assert!(create_completer(&config).is_err());
    }
}

use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

pub mod llm_provider_trait;
pub mod ollama_provider;
pub mod openai_provider;
pub mod pkg_config;

pub use llm_provider_trait::{CompletionModel, LLMProvider};
pub use pkg_config::{ModelConfig, ProviderKind};

/// Longest error body kept in a [`ModelError::Status`].
const MAX_ERROR_BODY: usize = 2000;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("model server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed model response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    pub(crate) fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: content.to_string(),
        }
    }

    pub(crate) fn user(content: &str) -> Self {
        Self {
            role: "user",
            content: content.to_string(),
        }
    }
}

pub(crate) async fn read_error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) => body.chars().take(MAX_ERROR_BODY).collect(),
        Err(e) => format!("<unreadable body: {}>", e),
    }
}

/// Strip surrounding whitespace and a single Markdown code fence.
///
/// A leading line starting with three backticks (optionally followed by a
/// language tag) is removed, as is a trailing line consisting of three
/// backticks or a closing fence glued to the end of the last code line.
/// Anything else is left untouched.
pub fn clean_completion(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        warn!("Model returned an empty completion");
        return String::new();
    }

    let mut body = trimmed;
    if body.starts_with("```") {
        body = match body.find('\n') {
            Some(idx) => &body[idx + 1..],
            None => "",
        };
    }

    let tail = body.trim_end();
    let last_line_start = tail.rfind('\n').map_or(0, |idx| idx + 1);
    if tail[last_line_start..].trim() == "```" {
        body = &tail[..last_line_start];
    } else if let Some(stripped) = tail.strip_suffix("```") {
        body = stripped;
    }

    body.trim().to_string()
}

/// Model client used by the conversion pipeline.
///
/// Owns one provider chosen from [`ModelConfig::provider`]; every completion
/// is passed through [`clean_completion`].
pub struct ModelClient {
    provider: Box<dyn LLMProvider>,
    config: ModelConfig,
}

impl ModelClient {
    pub fn new(config: ModelConfig) -> Self {
        let provider: Box<dyn LLMProvider> = match config.provider {
            ProviderKind::OpenAI => Box::new(openai_provider::OpenAIProvider::new(config.clone())),
            ProviderKind::Ollama => Box::new(ollama_provider::OllamaProvider::new(config.clone())),
        };
        Self { provider, config }
    }

    pub fn with_provider(config: ModelConfig, provider: Box<dyn LLMProvider>) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub async fn health_check(&self) -> Result<(), ModelError> {
        debug!(
            "Checking {} backend at {}",
            self.provider.provider_name(),
            self.config.base_url
        );
        self.provider.health_check().await
    }
}

#[async_trait::async_trait]
impl CompletionModel for ModelClient {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, ModelError> {
        info!(
            "Requesting completion from {} ({})",
            self.provider.provider_name(),
            self.config.model
        );
        let raw = self.provider.chat_with_prompt(system_prompt, prompt).await?;
        let cleaned = clean_completion(&raw);
        debug!(
            "Completion cleaned: {} -> {} chars",
            raw.len(),
            cleaned.len()
        );
        Ok(cleaned)
    }
}

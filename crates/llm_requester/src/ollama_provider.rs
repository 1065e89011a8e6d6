use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::llm_provider_trait::LLMProvider;
use crate::pkg_config::ModelConfig;
use crate::{ChatMessage, ModelError, read_error_body};

/// Native Ollama chat API (`POST {base}/api/chat`, non-streaming).
pub struct OllamaProvider {
    client: reqwest::Client,
    config: ModelConfig,
}

impl OllamaProvider {
    pub fn new(config: ModelConfig) -> Self {
        info!(
            "Creating Ollama provider with model: {} at {}",
            config.model, config.base_url
        );
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn build_request(&self, system_prompt: &str, message: &str) -> OllamaChatRequest {
        let deterministic = self.config.deterministic;
        OllamaChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(message),
            ],
            stream: false,
            options: OllamaOptions {
                num_predict: self.config.max_new_tokens,
                temperature: deterministic.then_some(0.0),
                top_p: deterministic.then_some(1.0),
                seed: deterministic.then_some(0),
            },
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for OllamaProvider {
    async fn chat_with_prompt(&self, system_prompt: &str, message: &str) -> Result<String, ModelError> {
        let url = self.config.endpoint("api/chat");
        debug!("POST {} (user {} chars)", url, message.len());

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(system_prompt, message))
            .send()
            .await
            .map_err(|e| ModelError::Transport { url: url.clone(), source: e })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            error!("Ollama chat failed ({}): {}", status, body);
            return Err(ModelError::Status { status: status.as_u16(), body });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(format!("ollama chat body: {}", e)))?;

        info!(
            "Ollama chat completed, response length: {} chars",
            parsed.message.content.len()
        );
        Ok(parsed.message.content)
    }

    async fn health_check(&self) -> Result<(), ModelError> {
        let url = self.config.endpoint("api/tags");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ModelError::Transport { url: url.clone(), source: e })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ModelError::Status {
                status: status.as_u16(),
                body: read_error_body(response).await,
            })
        }
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

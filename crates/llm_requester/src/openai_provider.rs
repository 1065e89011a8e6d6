//! OpenAI-compatible chat completions
//!
//! Works against any server exposing `POST {base}/chat/completions`
//! (vLLM, TGI, llama.cpp server, OpenAI itself).

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::llm_provider_trait::LLMProvider;
use crate::pkg_config::ModelConfig;
use crate::{ChatMessage, ModelError, read_error_body};

pub struct OpenAIProvider {
    client: reqwest::Client,
    config: ModelConfig,
}

impl OpenAIProvider {
    pub fn new(config: ModelConfig) -> Self {
        info!(
            "Creating OpenAI-compatible provider with model: {} at {}",
            config.model, config.base_url
        );
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn build_request(&self, system_prompt: &str, message: &str) -> ChatCompletionRequest {
        let deterministic = self.config.deterministic;
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(message),
            ],
            max_tokens: self.config.max_new_tokens,
            temperature: deterministic.then_some(0.0),
            top_p: deterministic.then_some(1.0),
            seed: deterministic.then_some(0),
            stream: false,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.bearer_token() {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_with_prompt(&self, system_prompt: &str, message: &str) -> Result<String, ModelError> {
        let url = self.config.endpoint("chat/completions");
        let payload = self.build_request(system_prompt, message);
        debug!(
            "POST {} (system {} chars, user {} chars, max_tokens {})",
            url,
            system_prompt.len(),
            message.len(),
            payload.max_tokens
        );

        let response = self
            .authorized(self.client.post(&url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ModelError::Transport { url: url.clone(), source: e })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            error!("OpenAI-compatible API error ({}): {}", status, body);
            return Err(ModelError::Status { status: status.as_u16(), body });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(format!("chat completion body: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Malformed("response contained no choices".to_string()))?;

        info!(
            "OpenAI-compatible chat completed, response length: {} chars",
            content.len()
        );
        Ok(content)
    }

    async fn health_check(&self) -> Result<(), ModelError> {
        let url = self.config.endpoint("models");
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ModelError::Transport { url: url.clone(), source: e })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = read_error_body(response).await;
            Err(ModelError::Status { status: status.as_u16(), body })
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer, api_key: Option<&str>) -> OpenAIProvider {
        OpenAIProvider::new(ModelConfig {
            base_url: format!("{}/v1", server.uri()),
            model: "qwen-coder".to_string(),
            api_key: api_key.map(str::to_string),
            ..ModelConfig::default()
        })
    }

    #[tokio::test]
    async fn test_chat_sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "qwen-coder",
                "max_tokens": 2048,
                "seed": 0,
                "stream": false,
                "messages": [
                    {"role": "system", "content": "be terse"},
                    {"role": "user", "content": "convert this"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "public class A {}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider_for(&server, None)
            .chat_with_prompt("be terse", "convert this")
            .await
            .unwrap();
        assert_eq!(reply, "public class A {}");
    }

    #[tokio::test]
    async fn test_api_key_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider_for(&server, Some("sk-test"))
            .chat_with_prompt("s", "u")
            .await
            .unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn test_sampling_omitted_when_not_deterministic() {
        let provider = OpenAIProvider::new(ModelConfig {
            deterministic: false,
            ..ModelConfig::default()
        });
        let body = serde_json::to_value(provider.build_request("s", "u")).unwrap();
        assert!(body.get("temperature").is_none());
        assert!(body.get("seed").is_none());
        assert_eq!(body["max_tokens"], 2048);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&server)
            .await;

        let err = provider_for(&server, None)
            .chat_with_prompt("s", "u")
            .await
            .unwrap_err();
        match err {
            ModelError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "model loading");
            }
            other => panic!("Expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = provider_for(&server, None)
            .chat_with_prompt("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_health_check_hits_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        provider_for(&server, None).health_check().await.unwrap();
    }
}

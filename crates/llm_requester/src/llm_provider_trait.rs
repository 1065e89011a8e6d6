use crate::ModelError;

/// A chat backend able to answer a (system, user) conversation.
///
/// Implementations return the assistant message verbatim; cleaning is done by
/// [`crate::ModelClient`].
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Single blocking-until-done chat request.
    async fn chat_with_prompt(&self, system_prompt: &str, message: &str) -> Result<String, ModelError>;

    /// Cheap request proving the backend is reachable.
    async fn health_check(&self) -> Result<(), ModelError>;

    fn provider_name(&self) -> &'static str;
}

/// What the rest of the pipeline sees: one cleaned completion per call.
#[async_trait::async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, ModelError>;
}

use std::{sync::Arc, time::Duration};

use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use tracing::debug;

use crate::{error::AppError, utils::config::AppConfig};

/// Black-box text completion service. Implementations must apply their own
/// timeout and report transport failures as errors rather than text.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AppError>;
}

/// Completion service speaking the OpenAI-compatible chat completions API.
pub struct OpenAiCompletion {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    timeout: Duration,
}

impl OpenAiCompletion {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig, client: Arc<Client<OpenAIConfig>>) -> Self {
        Self::new(client, config.completion_model.clone(), config.request_timeout())
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestUserMessage::from(prompt).into()])
            .build()?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| AppError::Timeout(self.timeout.as_secs()))??;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Transport("completion service returned no content".into()))?;

        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            reply_chars = content.chars().count(),
            "completion received"
        );

        Ok(content)
    }
}

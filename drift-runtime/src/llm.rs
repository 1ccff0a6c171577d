use drift_engine::traits::{Completion, LlmProvider};
use drift_providers::openai_compatible::{
    ChatMessage, OpenAiCompatibleChatConfig, build_chat_completions_request,
};
use drift_providers::parse::parse_openai_chat_completion;
use drift_providers::runtime;

#[derive(Clone)]
pub struct OpenAiCompatibleLlmProvider {
    api_key: String,
}

impl std::fmt::Debug for OpenAiCompatibleLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleLlmProvider")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiCompatibleLlmProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatibleLlmProvider {
    async fn complete(
        &self,
        base_url: &str,
        model: &str,
        temperature: f32,
        system_message: &str,
        user_message: &str,
    ) -> anyhow::Result<Completion> {
        let cfg = OpenAiCompatibleChatConfig {
            base_url: base_url.to_string(),
            api_key: self.api_key.clone(),
            model: model.to_string(),
            temperature,
        };

        let messages = vec![
            ChatMessage {
                role: "system".into(),
                content: system_message.to_string(),
            },
            ChatMessage {
                role: "user".into(),
                content: user_message.to_string(),
            },
        ];

        let req = build_chat_completions_request(&cfg, &messages);
        let resp = runtime::execute(&req).await?;

        if !resp.is_success() {
            return Err(anyhow::anyhow!(
                "OpenAI-compatible request failed: status={} body={}",
                resp.status,
                resp.body_preview()
            ));
        }

        let text = parse_openai_chat_completion(&resp.body)?;
        log::debug!("completion: {} chars from {model}", text.len());
        Ok(Completion {
            text,
            provider: "openai-compatible".into(),
            model: model.into(),
        })
    }
}

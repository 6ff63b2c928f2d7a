//! The abstract completion capability the engine is written against, plus
//! the OpenAI-backed implementation. Constructed once at startup and passed
//! by injection; nothing in the core reaches for a global client.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::OpenAiConfig;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Other(String),
}

impl FinishReason {
    fn from_api(raw: Option<&str>) -> Self {
        match raw {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(other) => FinishReason::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub finish_reason: FinishReason,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> anyhow::Result<Completion>;
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, req: &CompletionRequest) -> anyhow::Result<Completion> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": req.system },
                { "role": "user", "content": req.user }
            ],
            "temperature": req.temperature,
            "max_tokens": req.max_output_tokens,
            "response_format": { "type": "json_object" }
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(anyhow!("OpenAI API error ({status}): {text}"));
        }

        #[derive(Deserialize)]
        struct ChatMessage {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChatMessage,
            finish_reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("failed to parse OpenAI response: {e}"))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("OpenAI response contained no choices"))?;
        let content = choice
            .message
            .content
            .ok_or_else(|| anyhow!("OpenAI response contained no message content"))?;
        let finish_reason = FinishReason::from_api(choice.finish_reason.as_deref());
        debug!(?finish_reason, chars = content.len(), "completion received");

        Ok(Completion {
            text: content,
            finish_reason,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Scripted provider for tests: pops pre-seeded results in order and
    /// records every request it sees.
    pub struct ScriptedProvider {
        responses: Mutex<Vec<anyhow::Result<Completion>>>,
        pub seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        pub fn new(mut responses: Vec<anyhow::Result<Completion>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn ok(text: &str) -> anyhow::Result<Completion> {
            Ok(Completion {
                text: text.to_string(),
                finish_reason: FinishReason::Stop,
            })
        }

        pub fn truncated(text: &str) -> anyhow::Result<Completion> {
            Ok(Completion {
                text: text.to_string(),
                finish_reason: FinishReason::Length,
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, req: &CompletionRequest) -> anyhow::Result<Completion> {
            self.seen.lock().unwrap().push(req.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(anyhow!("scripted provider exhausted")))
        }
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(FinishReason::from_api(Some("stop")), FinishReason::Stop);
        assert_eq!(FinishReason::from_api(Some("length")), FinishReason::Length);
        assert_eq!(
            FinishReason::from_api(Some("content_filter")),
            FinishReason::Other("content_filter".into())
        );
        assert_eq!(FinishReason::from_api(None), FinishReason::Stop);
    }
}

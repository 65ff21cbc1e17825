//! External text generation

use crate::config::TextGenerationConfig;
use crate::error::GenerationError;
use crate::types::CommunicationStyle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "You are a concise, helpful AI coach.";

/// Structured request handed to a generator
#[derive(Debug, Clone, PartialEq)]
pub struct NudgePrompt {
    pub habit_name: String,
    pub probability: f64,
    pub style: CommunicationStyle,
}

impl NudgePrompt {
    pub fn new(habit_name: &str, probability: f64, style: CommunicationStyle) -> Self {
        Self {
            habit_name: habit_name.to_string(),
            probability,
            style,
        }
    }

    /// User message sent to a chat model
    pub fn render(&self) -> String {
        format!(
            "You are an AI coach adopting a {} tone. The user has a habit named '{}'. \
             The predicted success probability is {:.2}.\n\
             Write a single short motivational nudge (one or two sentences) with a practical tip.",
            self.style.as_str(),
            self.habit_name,
            self.probability
        )
    }
}

/// Pluggable text generator
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &NudgePrompt) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible `/v1/chat/completions` client
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatCompletionsGenerator {
    /// Build a client from configuration; `Disabled` unless the config is usable
    pub fn from_config(config: &TextGenerationConfig) -> Result<Self, GenerationError> {
        if !config.is_usable() {
            return Err(GenerationError::Disabled);
        }
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn request<'a>(&'a self, user_message: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &NudgePrompt) -> Result<String, GenerationError> {
        let user_message = prompt.render();

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(&user_message))
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status(status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        parse_reply(&body)
    }
}

/// Extract the first choice's trimmed content from a chat completions body
fn parse_reply(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GenerationError::Malformed("no choices in response".to_string()))?;

    let text = content.trim();
    if text.is_empty() {
        return Err(GenerationError::Malformed("empty message content".to_string()));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prompt_render() {
        let prompt = NudgePrompt::new("Running", 0.8765, CommunicationStyle::Mentor);
        let text = prompt.render();
        assert!(text.contains("mentor tone"));
        assert!(text.contains("'Running'"));
        assert!(text.contains("0.88"));
    }

    #[test]
    fn test_parse_reply() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Lace up and go!\n"}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "Lace up and go!");
    }

    #[test]
    fn test_parse_reply_rejects_empty() {
        assert!(matches!(
            parse_reply(r#"{"choices":[]}"#),
            Err(GenerationError::Malformed(_))
        ));
        assert!(matches!(
            parse_reply(r#"{"choices":[{"message":{"content":"   "}}]}"#),
            Err(GenerationError::Malformed(_))
        ));
        assert!(matches!(
            parse_reply("<html>bad gateway</html>"),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn test_disabled_config_builds_nothing() {
        let config = TextGenerationConfig::default();
        assert!(matches!(
            ChatCompletionsGenerator::from_config(&config),
            Err(GenerationError::Disabled)
        ));
    }

    #[test]
    fn test_request_shape() {
        let config = TextGenerationConfig {
            enabled: true,
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let generator = ChatCompletionsGenerator::from_config(&config).unwrap();
        let json = serde_json::to_value(generator.request("hello")).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 120);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(json["messages"][1]["content"], "hello");
    }
}

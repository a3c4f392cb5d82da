//! Sentiment analysis through an OpenAI-compatible chat completions API.

use super::analyzer::{AnalysisRequest, SentimentAnalyzer};
use super::parse::parse_assessment;
use crate::models::Assessment;
use crate::text::truncate_chars;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection settings for the chat API.
#[derive(Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_completion_tokens: u32,
}

impl fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_completion_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Analyzer backed by `{base_url}/chat/completions`.
pub struct OpenAiAnalyzer {
    settings: OpenAiSettings,
    http_client: Client,
}

impl OpenAiAnalyzer {
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn build_request(&self, request: &AnalysisRequest) -> Result<ChatRequest<'_>> {
        let user_content =
            serde_json::to_string(request).context("Failed to encode analysis request")?;

        Ok(ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(user_content),
                },
            ],
            max_completion_tokens: self.settings.max_completion_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        })
    }
}

#[async_trait]
impl SentimentAnalyzer for OpenAiAnalyzer {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    async fn assess(&self, request: &AnalysisRequest) -> Result<Assessment> {
        let body = self.build_request(request)?;

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!(
                        "Analysis request timed out after {}s",
                        self.settings.timeout.as_secs()
                    )
                } else if e.is_connect() {
                    anyhow!("Cannot connect to {}", self.settings.base_url)
                } else {
                    anyhow!("Failed to send analysis request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Analysis API error {}: {}",
                status,
                truncate_chars(&body, 200)
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Chat completion had no content"))?;

        debug!("Model reply: {}", truncate_chars(&content, 300));

        parse_assessment(&content)
    }
}

const SYSTEM_PROMPT: &str = "You are an analyst for an online gaming community. \
Given a Reddit post, output STRICT JSON with keys: \
sentiment_1_5 (integer 1..5, 1 most negative, 5 most positive), \
sentiment_reason (<=20 words), \
requested_items (array of 0..5 short phrases). \
Requested items = content the author is asking for (buff/nerf/add/remove/fix), \
or the main items being discussed (maps, weapons, characters, perks, modes, bugs). \
If unclear, return an empty array for requested_items.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve, CannedResponse};

    fn settings() -> OpenAiSettings {
        OpenAiSettings {
            api_key: "sk-secret".to_string(),
            model: "test-model".to_string(),
            base_url: "https://llm.example/v1/".to_string(),
            timeout: Duration::from_secs(10),
            max_completion_tokens: 250,
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", settings());
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let analyzer = OpenAiAnalyzer::new(settings()).unwrap();
        assert_eq!(analyzer.endpoint(), "https://llm.example/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let analyzer = OpenAiAnalyzer::new(settings()).unwrap();
        let request = AnalysisRequest {
            subreddit: "test".to_string(),
            title: "Nerf the shotgun".to_string(),
            body: "It one-shots from across the map".to_string(),
        };
        let body = serde_json::to_value(analyzer.build_request(&request).unwrap()).unwrap();

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_completion_tokens"], 250);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");

        let user: serde_json::Value =
            serde_json::from_str(body["messages"][1]["content"].as_str().unwrap()).unwrap();
        assert_eq!(user["title"], "Nerf the shotgun");
        assert_eq!(user["subreddit"], "test");
        assert!(!body.to_string().contains("sk-secret"));
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            subreddit: "test".to_string(),
            title: "Bring back the old map".to_string(),
            body: String::new(),
        }
    }

    async fn analyzer_for(response: CannedResponse) -> OpenAiAnalyzer {
        let base = serve(response).await;
        OpenAiAnalyzer::new(OpenAiSettings {
            base_url: format!("{}/v1", base),
            ..settings()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let analyzer = analyzer_for(CannedResponse::new(
            "500 Internal Server Error",
            r#"{"error":{"message":"overloaded"}}"#,
        ))
        .await;

        let message = format!("{:#}", analyzer.assess(&request()).await.unwrap_err());
        assert!(message.contains("500"));
        assert!(message.contains("overloaded"));
        assert!(!message.contains("sk-secret"));
    }

    #[tokio::test]
    async fn test_empty_choices_are_an_error() {
        let analyzer = analyzer_for(CannedResponse::new("200 OK", r#"{"choices":[]}"#)).await;

        let message = format!("{:#}", analyzer.assess(&request()).await.unwrap_err());
        assert!(message.contains("no content"));
    }

    #[tokio::test]
    async fn test_successful_reply_is_parsed() {
        let reply = serde_json::json!({
            "sentiment_1_5": 4,
            "sentiment_reason": "Nostalgic request",
            "requested_items": ["old map"]
        })
        .to_string();
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })
        .to_string();
        let analyzer = analyzer_for(CannedResponse::new("200 OK", body)).await;

        let assessment = analyzer.assess(&request()).await.unwrap();
        assert_eq!(assessment.sentiment, 4);
        assert_eq!(assessment.reason, "Nostalgic request");
        assert_eq!(assessment.requested_items, vec!["old map".to_string()]);
    }
}

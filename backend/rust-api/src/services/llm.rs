use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::metrics::track_llm_request;

/// Output of a text-generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    Text(String),
    Json(Value),
}

impl Generated {
    pub fn into_text(self) -> String {
        match self {
            Generated::Text(text) => text,
            Generated::Json(value) => value.to_string(),
        }
    }
}

/// Black-box text generator.
///
/// When `schema` is given the generator is asked for a JSON object that
/// matches it, but callers must still validate whatever comes back.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, schema: Option<&Value>) -> Result<Generated>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiGenerator {
    config: LlmConfig,
    client: Client,
}

impl OpenAiGenerator {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client for text generation")?;
        Ok(Self { config, client })
    }

    fn request_payload(&self, prompt: &str, schema: Option<&Value>) -> Value {
        let content = match schema {
            Some(schema) => format!(
                "{}\n\nRespond with a single JSON object matching this JSON schema:\n{}",
                prompt, schema
            ),
            None => prompt.to_string(),
        };

        let mut payload = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": content }],
            "temperature": self.config.temperature,
        });
        if schema.is_some() {
            payload["response_format"] = json!({ "type": "json_object" });
        }
        payload
    }

    async fn complete(&self, prompt: &str, schema: Option<&Value>) -> Result<Generated> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("No API key configured for text generation"))?;

        let payload = self.request_payload(prompt, schema);
        tracing::debug!(
            model = %self.config.model,
            prompt_chars = prompt.len(),
            structured = schema.is_some(),
            "Calling text-generation service"
        );

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.api_url.trim_end_matches('/')
            ))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .context("Text-generation request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read text-generation response")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Text-generation service returned {}: {}",
                status,
                truncate(&body, 300)
            ));
        }

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Text-generation service returned non-JSON response: {}", e))?;

        if let Some(error) = data.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(anyhow!("Text-generation API error: {}", message));
        }

        let content = extract_content(&data)?;

        if schema.is_some() {
            // Structured calls still fall back to text; the caller validates.
            return Ok(match serde_json::from_str::<Value>(content) {
                Ok(value @ Value::Object(_)) => Generated::Json(value),
                _ => Generated::Text(content.to_string()),
            });
        }
        Ok(Generated::Text(content.trim().to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str, schema: Option<&Value>) -> Result<Generated> {
        let kind = if schema.is_some() { "structured" } else { "text" };
        track_llm_request(kind, self.complete(prompt, schema)).await
    }
}

fn extract_content(data: &Value) -> Result<&str> {
    let choices = data
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Response missing 'choices' array"))?;

    let first = choices
        .first()
        .ok_or_else(|| anyhow!("No completions returned"))?;

    first
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Response message missing 'content'"))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> OpenAiGenerator {
        let mut config = crate::config::Config::for_tests().llm;
        config.model = "gpt-test".to_string();
        OpenAiGenerator::new(config).unwrap()
    }

    #[test]
    fn structured_requests_ask_for_json_objects() {
        let schema = json!({ "type": "object" });
        let payload = generator().request_payload("grade this", Some(&schema));

        assert_eq!(payload["model"], "gpt-test");
        assert_eq!(payload["response_format"]["type"], "json_object");
        let content = payload["messages"][0]["content"].as_str().unwrap();
        assert!(content.starts_with("grade this"));
        assert!(content.contains("\"type\":\"object\""));
    }

    #[test]
    fn plain_requests_have_no_response_format() {
        let payload = generator().request_payload("hello", None);
        assert!(payload.get("response_format").is_none());
        assert_eq!(payload["messages"][0]["content"], "hello");
    }

    #[test]
    fn extracts_first_choice_content() {
        let data = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Go on." } }]
        });
        assert_eq!(extract_content(&data).unwrap(), "Go on.");
        assert!(extract_content(&json!({ "choices": [] })).is_err());
        assert!(extract_content(&json!({})).is_err());
    }

    #[tokio::test]
    async fn missing_api_key_is_an_error() {
        let result = generator().generate("hello", None).await;
        assert!(result.is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 10), "hi");
    }
}

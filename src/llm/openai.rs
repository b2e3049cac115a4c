/// OpenAI-compatible chat completions client (OpenAI, OpenRouter)
use super::{snippet, GenerationError, LlmClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct OpenAiClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// # Arguments
    /// * `base_url` - API base, e.g. `https://openrouter.ai/api/v1`
    /// * `model` - Model identifier understood by the API
    /// * `api_key` - Bearer token
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let base_url = base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(GenerationError::NotConfigured(format!(
                "invalid API base URL '{}'",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature,
            max_tokens,
        })
    }
}

fn first_completion(resp: ChatResponse) -> Result<String, GenerationError> {
    resp.choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| GenerationError::Decode("response contained no choices".to_string()))
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("POST {}", self.url);
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(GenerationError::HttpStatus {
                status,
                url: self.url.clone(),
                snippet: snippet(&text),
            });
        }

        let out: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;
        first_completion(out)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = OpenAiClient::new(
            "https://openrouter.ai/api/v1/",
            "meta-llama/llama-3-8b-instruct:free",
            "sk-test",
            0.0,
            512,
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(client.url, "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_first_completion() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Paris."}}]}"#,
        )
        .unwrap();
        assert_eq!(first_completion(resp).unwrap(), "Paris.");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_completion(empty), Err(GenerationError::Decode(_))));

        let null_content: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(first_completion(null_content).unwrap(), "");
    }
}

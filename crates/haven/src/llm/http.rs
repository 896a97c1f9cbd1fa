//! OpenAI-compatible chat-completions client.

use super::{GenerationRequest, Generator};
use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct HttpGenerator {
    backend_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(backend_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        let backend_url = backend_url.into().trim_end_matches('/').to_string();
        info!("HTTP generator initialized with backend: {}", backend_url);
        Self {
            backend_url,
            model: model.into(),
            api_key,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(&config.llm_url, &config.llm_model, config.llm_api_key.clone())
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.backend_url)
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        debug!(
            "Generating for {} ({} prompt chars, max {} tokens)",
            request.component.as_str(),
            request.prompt.len(),
            request.max_output_tokens
        );

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: &request.prompt });

        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            stream: false,
        };

        let mut call = self.http_client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("LLM backend returned {}: {}", status, body);
            return Err(GenerationError::Unavailable(format!("backend returned {}", status)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Unavailable(format!("failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Component;

    fn request() -> GenerationRequest {
        GenerationRequest::new(Component::Synthesis, "How are you?").with_system("Be kind.")
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "test-model",
                "max_tokens": 150,
                "stream": false,
                "messages": [
                    {"role": "system", "content": "Be kind."},
                    {"role": "user", "content": "How are you?"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"I'm here for you."}}]}"#)
            .create_async()
            .await;

        let generator = HttpGenerator::new(server.url(), "test-model", Some("secret".into()));
        let text = generator.generate(request()).await.unwrap();
        assert_eq!(text, "I'm here for you.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_backend_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let generator = HttpGenerator::new(server.url(), "m", None);
        let err = generator.generate(request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable(_)));
        // backend body stays out of the error surfaced to callers
        assert!(!err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_empty_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let generator = HttpGenerator::new(server.url(), "m", None);
        assert_eq!(generator.generate(request()).await, Err(GenerationError::Empty));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let generator = HttpGenerator::new("http://127.0.0.1:9", "m", None);
        assert!(matches!(
            generator.generate(request()).await,
            Err(GenerationError::Unavailable(_))
        ));
    }
}

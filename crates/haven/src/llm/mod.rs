//! Text-generation capability.
//!
//! The pipeline only ever sees [`Generator`]: prompt in, text out. The HTTP
//! adapter talks to any OpenAI-compatible completion server, and
//! [`TracedGenerator`] records every call for offline prompt tuning.

pub mod http;
pub mod traced;

pub use http::HttpGenerator;
pub use traced::TracedGenerator;

use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline stage issuing a generation call. Used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Synthesis,
    MemorySummary,
    TherapyKnowledge,
    ResourceKnowledge,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Synthesis => "synthesis",
            Component::MemorySummary => "memory_summary",
            Component::TherapyKnowledge => "therapy_knowledge",
            Component::ResourceKnowledge => "resource_knowledge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub component: Component,
    pub system: Option<String>,
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(component: Component, prompt: impl Into<String>) -> Self {
        Self {
            component,
            system: None,
            prompt: prompt.into(),
            max_output_tokens: 150,
            temperature: 0.7,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Runs one generation call under a deadline. A timeout is reported as
/// [`GenerationError::Timeout`]; an all-whitespace completion as
/// [`GenerationError::Empty`].
pub async fn generate_within(
    generator: &dyn Generator,
    request: GenerationRequest,
    deadline: Duration,
) -> Result<String, GenerationError> {
    match tokio::time::timeout(deadline, generator.generate(request)).await {
        Ok(Ok(text)) if text.trim().is_empty() => Err(GenerationError::Empty),
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(GenerationError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubGenerator;

    #[tokio::test]
    async fn test_generate_within_trims_output() {
        let generator = StubGenerator::always("  hello there \n");
        let out = generate_within(
            &generator,
            GenerationRequest::new(Component::Synthesis, "hi"),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(out, Ok("hello there".to_string()));
    }

    #[tokio::test]
    async fn test_generate_within_times_out() {
        let generator = StubGenerator::always("late").with_delay(Duration::from_millis(200));
        let out = generate_within(
            &generator,
            GenerationRequest::new(Component::Synthesis, "hi"),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(out, Err(GenerationError::Timeout(Duration::from_millis(20))));
    }

    #[tokio::test]
    async fn test_blank_completion_is_an_error() {
        let generator = StubGenerator::always("   ");
        let out = generate_within(
            &generator,
            GenerationRequest::new(Component::MemorySummary, "x"),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(out, Err(GenerationError::Empty));
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new(Component::TherapyKnowledge, "p")
            .with_system("s")
            .max_output_tokens(100)
            .temperature(0.3);
        assert_eq!(request.system.as_deref(), Some("s"));
        assert_eq!(request.max_output_tokens, 100);
        assert_eq!(request.temperature, 0.3);
    }
}

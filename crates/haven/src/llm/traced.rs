use super::{GenerationRequest, Generator};
use crate::error::GenerationError;
use crate::trace::{TraceRecord, TraceSink};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Decorates a generator so every call lands in the trace sink.
pub struct TracedGenerator {
    inner: Arc<dyn Generator>,
    sink: Arc<dyn TraceSink>,
}

impl TracedGenerator {
    pub fn new(inner: Arc<dyn Generator>, sink: Arc<dyn TraceSink>) -> Self {
        Self { inner, sink }
    }
}

#[async_trait]
impl Generator for TracedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let component = request.component.as_str().to_string();
        let prompt_context = match &request.system {
            Some(system) => format!("{}\n\n{}", system, request.prompt),
            None => request.prompt.clone(),
        };

        let started = Instant::now();
        let result = self.inner.generate(request).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (response, success) = match &result {
            Ok(text) => (text.clone(), true),
            Err(e) => (e.to_string(), false),
        };
        self.sink.emit(TraceRecord {
            trace_id: uuid::Uuid::new_v4().to_string(),
            session_id: None,
            component,
            prompt_context,
            response,
            success,
            latency_ms,
            timestamp: Utc::now(),
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Component;
    use crate::testing::{CollectingTraceSink, StubGenerator};

    #[tokio::test]
    async fn test_successful_call_is_traced() {
        let sink = Arc::new(CollectingTraceSink::default());
        let traced = TracedGenerator::new(Arc::new(StubGenerator::always("ok")), sink.clone());

        let out = traced
            .generate(GenerationRequest::new(Component::Synthesis, "prompt").with_system("sys"))
            .await;
        assert_eq!(out, Ok("ok".to_string()));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].component, "synthesis");
        assert!(records[0].prompt_context.starts_with("sys"));
        assert!(records[0].success);
    }

    #[tokio::test]
    async fn test_failed_call_is_traced_and_returned() {
        let sink = Arc::new(CollectingTraceSink::default());
        let traced = TracedGenerator::new(Arc::new(StubGenerator::failing()), sink.clone());

        let out = traced.generate(GenerationRequest::new(Component::MemorySummary, "p")).await;
        assert!(out.is_err());
        assert!(!sink.records()[0].success);
    }
}

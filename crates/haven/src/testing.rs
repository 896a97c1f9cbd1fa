//! Substitutable collaborators for unit tests.

use crate::error::{GenerationError, RetrievalError};
use crate::knowledge::{Collection, RetrievedDocument, Retriever};
use crate::llm::{Component, GenerationRequest, Generator};
use crate::trace::{TraceRecord, TraceSink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

enum Script {
    Always(String),
    Failing,
    Sequence(Mutex<VecDeque<Result<String, GenerationError>>>),
}

/// Scripted generator that records every request it receives.
pub struct StubGenerator {
    script: Script,
    delay: Option<Duration>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl StubGenerator {
    pub fn always(text: &str) -> Self {
        Self::with_script(Script::Always(text.to_string()))
    }

    pub fn failing() -> Self {
        Self::with_script(Script::Failing)
    }

    /// Plays the given results in order, then fails.
    pub fn sequence(results: Vec<Result<String, GenerationError>>) -> Self {
        Self::with_script(Script::Sequence(Mutex::new(results.into())))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_script(script: Script) -> Self {
        Self { script, delay: None, calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, component: Component) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| r.component == component).count()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Always(text) => Ok(text.clone()),
            Script::Failing => Err(GenerationError::Unavailable("stub offline".into())),
            Script::Sequence(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Unavailable("script exhausted".into()))),
        }
    }
}

/// Retriever returning fixed documents, or failing.
pub struct StubRetriever {
    documents: Vec<RetrievedDocument>,
    fail: bool,
    delay: Option<Duration>,
}

impl StubRetriever {
    pub fn with_documents(texts: &[&str]) -> Self {
        let documents = texts
            .iter()
            .enumerate()
            .map(|(i, t)| RetrievedDocument {
                title: format!("doc {}", i),
                text: t.to_string(),
                relevance: 1.0 - i as f64 * 0.1,
            })
            .collect();
        Self { documents, fail: false, delay: None }
    }

    pub fn empty() -> Self {
        Self::with_documents(&[])
    }

    pub fn failing() -> Self {
        Self { documents: Vec::new(), fail: true, delay: None }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Retriever for StubRetriever {
    async fn search(
        &self,
        _query: &str,
        _collection: Collection,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RetrievalError::Backend("stub offline".into()));
        }
        Ok(self.documents.iter().take(top_k).cloned().collect())
    }
}

#[derive(Default)]
pub struct CollectingTraceSink {
    records: Mutex<Vec<TraceRecord>>,
}

impl CollectingTraceSink {
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TraceSink for CollectingTraceSink {
    fn emit(&self, record: TraceRecord) {
        self.records.lock().unwrap().push(record);
    }
}

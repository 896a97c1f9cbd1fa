//! Retrieval-grounded tools: search a curated collection, then condense the
//! hits into one short contribution with a single generation call.

use super::{ToolContext, ToolPayload};
use crate::error::{RetrievalError, ToolError};
use crate::knowledge::{Collection, RetrievedDocument, Retriever};
use crate::llm::{generate_within, Component, GenerationRequest, Generator};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const RETRIEVAL_TOP_K: usize = 3;
const CONTRIBUTION_MAX_TOKENS: u32 = 100;
const CONTRIBUTION_TEMPERATURE: f32 = 0.7;

const THERAPY_SYSTEM_PROMPT: &str = "You are a supportive friend with a good grasp of coping \
strategies. Suggest one practical technique the person could try right away, in warm everyday \
language. Reply with one or two sentences and no lists.";

const RESOURCE_SYSTEM_PROMPT: &str = "You help people find professional and community support. \
Point to one concrete, realistic next step for getting help, in warm everyday language. Reply \
with one or two sentences and no lists.";

pub struct KnowledgeTool {
    collection: Collection,
    generator: Arc<dyn Generator>,
    retriever: Arc<dyn Retriever>,
    timeout: Duration,
}

impl KnowledgeTool {
    pub fn new(
        collection: Collection,
        generator: Arc<dyn Generator>,
        retriever: Arc<dyn Retriever>,
        timeout: Duration,
    ) -> Self {
        Self { collection, generator, retriever, timeout }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub async fn run(&self, ctx: &ToolContext) -> Result<ToolPayload, ToolError> {
        let documents = match self.retrieve(&ctx.safe_text).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("{} retrieval failed, contributing nothing: {}", self.collection.as_str(), e);
                return Ok(ToolPayload::empty_knowledge());
            }
        };
        debug!("{} retrieval returned {} documents", self.collection.as_str(), documents.len());

        let (component, system) = match self.collection {
            Collection::Therapy => (Component::TherapyKnowledge, THERAPY_SYSTEM_PROMPT),
            Collection::Resource => (Component::ResourceKnowledge, RESOURCE_SYSTEM_PROMPT),
        };
        let request = GenerationRequest::new(component, build_prompt(&ctx.safe_text, &documents))
            .with_system(system)
            .max_output_tokens(CONTRIBUTION_MAX_TOKENS)
            .temperature(CONTRIBUTION_TEMPERATURE);
        let contribution = generate_within(self.generator.as_ref(), request, self.timeout).await?;

        Ok(ToolPayload::Knowledge {
            sources: documents.into_iter().map(|d| d.title).collect(),
            contribution,
        })
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        tokio::time::timeout(
            self.timeout,
            self.retriever.search(query, self.collection, RETRIEVAL_TOP_K),
        )
        .await
        .unwrap_or(Err(RetrievalError::Timeout(self.timeout)))
    }
}

fn build_prompt(message: &str, documents: &[RetrievedDocument]) -> String {
    let mut prompt = format!("Their message:\n{}\n", message);
    if !documents.is_empty() {
        prompt.push_str("\nBackground material:\n");
        for (i, doc) in documents.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n{}\n", i + 1, doc.title, doc.text));
        }
    }
    prompt.push_str("\nYour contribution:\n");
    prompt
}

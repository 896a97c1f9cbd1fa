//! Builds the single generation request that produces the user-facing reply.

use crate::clinical::ClinicalContext;
use crate::error::GenerationError;
use crate::llm::{generate_within, Component, GenerationRequest, Generator};
use crate::memory::{MemorySnapshot, Role};
use crate::metrics;
use crate::tools::ToolResult;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const RESPONSE_MAX_TOKENS: u32 = 150;
const RESPONSE_TEMPERATURE: f32 = 0.7;
/// Assistant replies scanned for suggestions that were already made.
const REPETITION_LOOKBACK: usize = 3;

const SYSTEM_PROMPT: &str = "You are a supportive companion in a conversation about how someone is \
feeling. Reply like a caring friend: warm, plain language, two to four sentences, at most one \
question. Use the background notes to shape your tone but never mention them, never give \
diagnoses or labels, and never describe how your reply was put together.";

/// Suggestions recognised in earlier replies, with the words that reveal them.
const SUGGESTION_MARKERS: &[(&str, &[&str])] = &[
    ("journaling", &["journal"]),
    ("walking or exercise", &["walk", "exercise"]),
    ("breathing exercises", &["breath"]),
    ("professional help", &["therapist", "counselor", "counsellor"]),
    ("talking to someone", &["friend", "talk to"]),
    ("music or creative activities", &["music", "draw", "paint"]),
];

pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Exactly one generation call. The output is an unchecked draft.
    pub async fn synthesize(
        &self,
        safe_text: &str,
        tool_results: &[ToolResult],
        clinical: &ClinicalContext,
        memory: &MemorySnapshot,
    ) -> Result<String, GenerationError> {
        let prompt = build_prompt(safe_text, tool_results, clinical, memory);
        debug!("Synthesis prompt is {} chars", prompt.len());

        let request = GenerationRequest::new(Component::Synthesis, prompt)
            .with_system(SYSTEM_PROMPT)
            .max_output_tokens(RESPONSE_MAX_TOKENS)
            .temperature(RESPONSE_TEMPERATURE);

        let started = Instant::now();
        let result = generate_within(self.generator.as_ref(), request, self.timeout).await;
        metrics::observe_synthesis(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!("Synthesis failed: {}", e);
        }
        result
    }
}

pub fn build_prompt(
    safe_text: &str,
    tool_results: &[ToolResult],
    clinical: &ClinicalContext,
    memory: &MemorySnapshot,
) -> String {
    let mut sections: Vec<(&str, String)> = Vec::new();

    if !memory.is_empty() {
        sections.push(("CONVERSATION SO FAR", memory.render()));
    }

    sections.push(("BACKGROUND (never mention)", clinical.render()));

    let contributions: Vec<String> = tool_results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.payload.as_ref().and_then(|p| p.render()))
        .collect();
    if !contributions.is_empty() {
        sections.push(("INSIGHTS TO DRAW ON", contributions.join("\n")));
    }

    let already = suggestions_made(memory);
    if !already.is_empty() {
        sections.push((
            "AVOID REPETITION",
            format!("Already suggested: {}. Offer something new or simply listen.", already.join(", ")),
        ));
    }

    sections.push(("USER MESSAGE", safe_text.to_string()));

    let mut prompt = String::new();
    for (title, body) in sections {
        prompt.push_str(&format!("=== {} ===\n{}\n\n", title, body.trim_end()));
    }
    prompt.push_str("=== YOUR RESPONSE ===\n");
    prompt
}

fn suggestions_made(memory: &MemorySnapshot) -> Vec<&'static str> {
    let replies: Vec<String> = memory
        .recent_messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::Assistant)
        .take(REPETITION_LOOKBACK)
        .map(|m| m.content.to_lowercase())
        .collect();

    SUGGESTION_MARKERS
        .iter()
        .filter(|(_, markers)| replies.iter().any(|r| markers.iter().any(|m| r.contains(m))))
        .map(|(name, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinical::{ClinicalState, MoodSeries};
    use crate::memory::Message;
    use crate::testing::StubGenerator;
    use crate::tools::{ToolKind, ToolPayload};

    fn clinical() -> ClinicalContext {
        ClinicalContext::from_state(&ClinicalState::new(), &MoodSeries::new())
    }

    fn results() -> Vec<ToolResult> {
        vec![
            ToolResult::ok(
                ToolKind::TherapyKnowledge,
                ToolPayload::Knowledge { sources: vec!["Box breathing".into()], contribution: "Slow breathing can help.".into() },
                12,
            ),
            ToolResult::failed(ToolKind::ResourceKnowledge, "timeout", 100),
        ]
    }

    #[tokio::test]
    async fn test_single_generation_call() {
        let generator = Arc::new(StubGenerator::always("That sounds really hard."));
        let synthesizer = Synthesizer::new(generator.clone(), Duration::from_secs(1));

        let draft = synthesizer
            .synthesize("I can't calm down", &results(), &clinical(), &MemorySnapshot::default())
            .await
            .unwrap();
        assert_eq!(draft, "That sounds really hard.");

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].component, Component::Synthesis);
        assert_eq!(calls[0].max_output_tokens, 150);
        assert_eq!(calls[0].temperature, 0.7);
    }

    #[test]
    fn test_prompt_contains_only_successful_contributions() {
        let prompt = build_prompt("I can't calm down", &results(), &clinical(), &MemorySnapshot::default());
        assert!(prompt.contains("=== USER MESSAGE ===\nI can't calm down"));
        assert!(prompt.contains("Slow breathing can help."));
        assert!(!prompt.contains("timeout"));
        assert!(!prompt.contains("resource_knowledge"));
        assert!(prompt.ends_with("=== YOUR RESPONSE ===\n"));
    }

    #[test]
    fn test_prompt_flags_repeated_suggestions() {
        let memory = MemorySnapshot {
            recent_messages: vec![
                Message::user("I'm stressed"),
                Message::assistant("Maybe try writing in a journal tonight?"),
            ],
            turn_count: 1,
            ..MemorySnapshot::default()
        };
        let prompt = build_prompt("still stressed", &[], &clinical(), &memory);
        assert!(prompt.contains("=== AVOID REPETITION ===\nAlready suggested: journaling"));
        assert!(prompt.contains("=== CONVERSATION SO FAR ==="));
    }

    #[tokio::test]
    async fn test_failure_is_returned() {
        let synthesizer = Synthesizer::new(Arc::new(StubGenerator::failing()), Duration::from_secs(1));
        let out = synthesizer
            .synthesize("hi", &[], &clinical(), &MemorySnapshot::default())
            .await;
        assert!(matches!(out, Err(GenerationError::Unavailable(_))));
    }
}

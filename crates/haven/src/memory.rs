//! Conversation memory: a bounded window of raw messages plus append-only
//! summaries generated every [`SUMMARY_INTERVAL`] turns.

use crate::llm::{generate_within, Component, GenerationRequest, Generator};
use crate::utils::TextUtils;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SUMMARY_INTERVAL: u64 = 10;
pub const DEFAULT_RECENT_WINDOW: usize = 8;

const DIGEST_CHARS: usize = 200;
const MAX_NOTES: usize = 20;
const SUMMARY_MAX_TOKENS: u32 = 150;
const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Summary text for a span in which every turn was stopped by the safety gate.
const BLOCKED_SPAN_SUMMARY: &str =
    "This stretch of the conversation was paused for safety support; no details were kept.";

const SUMMARY_SYSTEM_PROMPT: &str = "You condense supportive conversations into brief notes. \
Write two or three sentences in plain language about what the person shared, how they seemed \
to feel and anything that helped. Do not give advice, labels or diagnoses.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    /// Inclusive, 1-based turn numbers.
    pub first_turn: u64,
    pub last_turn: u64,
    pub text: String,
    pub created_at_turn: u64,
}

/// A turn awaiting summarization. Blocked turns carry no digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PendingTurn {
    number: u64,
    digest: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMemory {
    window: usize,
    recent: VecDeque<Message>,
    summaries: Vec<MemorySummary>,
    pending: Vec<PendingTurn>,
    notes: Vec<String>,
    turn_count: u64,
}

/// Read-only view handed to the controller, tools and synthesizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub recent_messages: Vec<Message>,
    pub summaries: Vec<MemorySummary>,
    pub notes: Vec<String>,
    pub turn_count: u64,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_WINDOW)
    }
}

impl ConversationMemory {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            recent: VecDeque::with_capacity(window.max(1)),
            summaries: Vec::new(),
            pending: Vec::new(),
            notes: Vec::new(),
            turn_count: 0,
        }
    }

    pub fn turn_count(&self) -> u64 {
        self.turn_count
    }

    pub fn summaries(&self) -> &[MemorySummary] {
        &self.summaries
    }

    /// Raw messages in the window, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &Message> {
        self.recent.iter()
    }

    /// Records one completed turn. `assistant` is `None` when the turn was
    /// cancelled before a reply existed. Returns how many summaries were
    /// appended.
    pub async fn append(
        &mut self,
        user: &str,
        assistant: Option<&str>,
        generator: &dyn Generator,
        timeout: Duration,
    ) -> usize {
        self.turn_count += 1;
        self.push_message(Message::user(user));
        if let Some(reply) = assistant {
            self.push_message(Message::assistant(reply));
        }

        let mut digest = format!("User: {}", user.trim());
        if let Some(reply) = assistant {
            digest.push_str(&format!(" | Assistant: {}", reply.trim()));
        }
        self.pending.push(PendingTurn {
            number: self.turn_count,
            digest: Some(TextUtils::truncate_with_ellipsis(&digest, DIGEST_CHARS).into_owned()),
        });

        self.consolidate(generator, timeout).await
    }

    /// Counts a hard-stopped turn toward the summary cadence without keeping
    /// any of its text.
    pub async fn record_blocked_turn(&mut self, generator: &dyn Generator, timeout: Duration) -> usize {
        self.turn_count += 1;
        self.pending.push(PendingTurn { number: self.turn_count, digest: None });
        self.consolidate(generator, timeout).await
    }

    /// Keeps a short note across the whole session, outside the raw window.
    pub fn pin_note(&mut self, note: &str) -> bool {
        let note = note.trim();
        if note.is_empty() || self.notes.iter().any(|n| n == note) {
            return false;
        }
        if self.notes.len() == MAX_NOTES {
            self.notes.remove(0);
        }
        self.notes.push(note.to_string());
        true
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            recent_messages: self.recent.iter().cloned().collect(),
            summaries: self.summaries.clone(),
            notes: self.notes.clone(),
            turn_count: self.turn_count,
        }
    }

    fn push_message(&mut self, message: Message) {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(message);
    }

    async fn consolidate(&mut self, generator: &dyn Generator, timeout: Duration) -> usize {
        if self.turn_count % SUMMARY_INTERVAL != 0 {
            return 0;
        }

        let due = (self.turn_count / SUMMARY_INTERVAL) as usize;
        let mut created = 0;
        while self.summaries.len() < due {
            let first_turn = self.summaries.len() as u64 * SUMMARY_INTERVAL + 1;
            let last_turn = first_turn + SUMMARY_INTERVAL - 1;
            let digests: Vec<&str> = self
                .pending
                .iter()
                .filter(|p| (first_turn..=last_turn).contains(&p.number))
                .filter_map(|p| p.digest.as_deref())
                .collect();

            let text = if digests.is_empty() {
                BLOCKED_SPAN_SUMMARY.to_string()
            } else {
                let request = GenerationRequest::new(Component::MemorySummary, summary_prompt(&digests))
                    .with_system(SUMMARY_SYSTEM_PROMPT)
                    .max_output_tokens(SUMMARY_MAX_TOKENS)
                    .temperature(SUMMARY_TEMPERATURE);
                match generate_within(generator, request, timeout).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(
                            "Summary for turns {}-{} failed, retrying at next boundary: {}",
                            first_turn, last_turn, e
                        );
                        break;
                    }
                }
            };

            self.summaries.push(MemorySummary {
                first_turn,
                last_turn,
                text,
                created_at_turn: self.turn_count,
            });
            self.pending.retain(|p| p.number > last_turn);
            created += 1;
            info!("Summarized turns {}-{}", first_turn, last_turn);
        }

        debug!(
            "Memory at turn {}: {} summaries, {} pending turns",
            self.turn_count,
            self.summaries.len(),
            self.pending.len()
        );
        created
    }
}

fn summary_prompt(digests: &[&str]) -> String {
    let mut prompt = String::from("Summarize these conversation turns:\n\n");
    for digest in digests {
        prompt.push_str("- ");
        prompt.push_str(digest);
        prompt.push('\n');
    }
    prompt
}

impl MemorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.recent_messages.is_empty() && self.summaries.is_empty() && self.notes.is_empty()
    }

    /// Last user message in the window, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.recent_messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.summaries.is_empty() {
            out.push_str("Earlier in the conversation:\n");
            for summary in &self.summaries {
                out.push_str(&format!("- {}\n", summary.text));
            }
        }
        if !self.notes.is_empty() {
            out.push_str("Things they asked to remember:\n");
            for note in &self.notes {
                out.push_str(&format!("- {}\n", note));
            }
        }
        if !self.recent_messages.is_empty() {
            out.push_str("Recent messages:\n");
            for message in &self.recent_messages {
                out.push_str(&format!("{}: {}\n", message.role.as_str(), message.content));
            }
        }
        out
    }
}

//! Sessions and their turns.
//!
//! A [`Session`] is owned by exactly one [`SessionActor`]; nothing else
//! mutates its clinical state or memory. [`SessionManager`] routes requests
//! to actors and keeps distinct sessions fully independent.

pub mod actor;
pub mod manager;

pub use actor::{SessionActor, SessionHandle};
pub use manager::{SessionManager, TurnTicket};

use crate::clinical::{ClinicalState, MoodPoint, MoodSeries, RiskLevel};
use crate::memory::{ConversationMemory, MemorySummary};
use crate::pipeline::ExecutionPlan;
use crate::signals::{Trend, TurnSignals};
use crate::tools::ToolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Reply generated and approved by the scrubber.
    Completed,
    /// Reply replaced by the scrubber fallback; flagged for review.
    Scrubbed,
    /// Hard stop from the safety gate.
    Blocked,
    /// Synthesis failed; a generic apology was returned.
    Degraded,
    /// The caller went away before a reply was produced.
    Cancelled,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Completed => "completed",
            Disposition::Scrubbed => "scrubbed",
            Disposition::Blocked => "blocked",
            Disposition::Degraded => "degraded",
            Disposition::Cancelled => "cancelled",
        }
    }
}

/// One processed user message. Never modified after it is pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based position in the session.
    pub index: u64,
    pub user_text: String,
    /// Empty for hard-stopped turns.
    pub safe_text: String,
    pub timestamp: DateTime<Utc>,
    pub signals: Option<TurnSignals>,
    pub plan: Option<ExecutionPlan>,
    pub tool_results: Vec<ToolResult>,
    pub response: String,
    pub disposition: Disposition,
    pub reason: Option<String>,
    pub flagged_for_review: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub turns: Vec<Turn>,
    pub clinical: ClinicalState,
    pub mood: MoodSeries,
    pub memory: ConversationMemory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, recent_window: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            clinical: ClinicalState::new(),
            mood: MoodSeries::new(),
            memory: ConversationMemory::new(recent_window),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn next_turn_index(&self) -> u64 {
        self.turns.len() as u64 + 1
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.updated_at = turn.timestamp;
        self.turns.push(turn);
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id.clone(),
            turn_count: self.turns.len(),
            risk: self.clinical.risk,
            crisis_locked: self.clinical.is_crisis_locked(),
            mood_trend: self.mood.trend(),
            latest_mood: self.mood.latest().cloned(),
            summaries: self.memory.summaries().to_vec(),
            flagged_turns: self
                .turns
                .iter()
                .filter(|t| t.flagged_for_review)
                .map(|t| t.index)
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Operator-facing summary of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub id: String,
    pub turn_count: usize,
    pub risk: RiskLevel,
    pub crisis_locked: bool,
    pub mood_trend: Trend,
    pub latest_mood: Option<MoodPoint>,
    pub summaries: Vec<MemorySummary>,
    pub flagged_turns: Vec<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//! Per-turn orchestration.
//!
//! Safety gate, then signal extraction and clinical update, then the
//! controller's plan, tool execution, one synthesis call and the output
//! scrubber. Memory is updated at the end of every path. A hard stop only
//! advances the summary cadence.

pub mod controller;
pub mod synthesizer;

pub use controller::{Controller, ExecutionPlan, PlanRequest, PlanStep};
pub use synthesizer::Synthesizer;

use crate::clinical::{ClinicalContext, MoodPoint, RiskLevel, RiskOverride};
use crate::knowledge::Retriever;
use crate::lexicon::GENERATION_APOLOGY;
use crate::llm::Generator;
use crate::memory::Message;
use crate::metrics;
use crate::safety::{scrub, BlockReason, GateOutcome, SafetyGate, ScrubOutcome};
use crate::session::{Disposition, Session, Turn};
use crate::signals::{self, TurnSignals};
use crate::tools::{ToolContext, ToolEngine, ToolPayload, ToolRegistry, ToolResult};
use crate::trace::{TraceRecord, TraceSink};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Component label on per-turn trace records.
const TURN_TRACE_COMPONENT: &str = "turn";

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub generation_timeout: Duration,
    pub tool_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            generation_timeout: config.generation_timeout(),
            tool_timeout: config.tool_timeout(),
        }
    }
}

/// What the caller gets back for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub turn_index: u64,
    pub response: String,
    pub disposition: Disposition,
    pub flagged_for_review: bool,
    pub risk: RiskLevel,
}

pub struct TurnPipeline {
    gate: SafetyGate,
    controller: Controller,
    engine: ToolEngine,
    synthesizer: Synthesizer,
    generator: Arc<dyn Generator>,
    trace: Arc<dyn TraceSink>,
    settings: PipelineSettings,
}

impl TurnPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        retriever: Arc<dyn Retriever>,
        trace: Arc<dyn TraceSink>,
        settings: PipelineSettings,
    ) -> Self {
        let registry = ToolRegistry::standard(generator.clone(), retriever, settings.tool_timeout);
        Self::with_registry(generator, registry, trace, settings)
    }

    pub fn with_registry(
        generator: Arc<dyn Generator>,
        registry: ToolRegistry,
        trace: Arc<dyn TraceSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            gate: SafetyGate::new(),
            controller: Controller::new(),
            engine: ToolEngine::new(Arc::new(registry), settings.tool_timeout),
            synthesizer: Synthesizer::new(generator.clone(), settings.generation_timeout),
            generator,
            trace,
            settings,
        }
    }

    /// Processes one raw user message against the session. Must only be
    /// called by the session's owner, one turn at a time.
    pub async fn process(&self, session: &mut Session, raw: &str, cancel: &CancellationToken) -> TurnOutcome {
        let started = Instant::now();
        let index = session.next_turn_index();
        debug!("Session {} turn {} started", session.id, index);

        let (safe_text, soft_flags) = match self.gate.evaluate(raw) {
            GateOutcome::HardStop { reason, response } => {
                return self.hard_stop(session, raw, reason, response, started).await;
            }
            GateOutcome::Pass { safe_text, soft_flags, sanitized } => {
                if sanitized {
                    info!("Session {} turn {}: input was sanitized", session.id, index);
                }
                (safe_text, soft_flags)
            }
        };

        let history: Vec<Message> = session.memory.recent().cloned().collect();
        let signals = signals::extract(&safe_text, &history, &soft_flags);
        session.clinical.update(&signals.symptoms, None);
        session.mood.push(MoodPoint::from_signals(&signals, Utc::now()));

        let draft = PendingTurn { raw, safe_text, signals, started };
        if cancel.is_cancelled() {
            return self.cancelled(session, draft, None, Vec::new()).await;
        }

        let available = self.engine.registry().available();
        let memory = session.memory.snapshot();
        let plan = self.controller.plan(&PlanRequest {
            safe_text: &draft.safe_text,
            signals: &draft.signals,
            clinical: &session.clinical,
            memory: &memory,
            available: &available,
        });

        let ctx = ToolContext {
            safe_text: draft.safe_text.clone(),
            signals: draft.signals.clone(),
            memory,
            clinical: session.clinical.clone(),
        };
        let results = self.engine.execute(&plan, &ctx, cancel).await;
        apply_memory_writes(session, &results);

        if cancel.is_cancelled() {
            return self.cancelled(session, draft, Some(plan), results).await;
        }

        let clinical = ClinicalContext::from_state(&session.clinical, &session.mood);
        let synthesis = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.synthesizer.synthesize(&draft.safe_text, &results, &clinical, &ctx.memory) => Some(result),
        };
        let Some(synthesis) = synthesis else {
            return self.cancelled(session, draft, Some(plan), results).await;
        };

        let (response, disposition, reason, flagged) = match synthesis {
            Err(e) => (
                GENERATION_APOLOGY.to_string(),
                Disposition::Degraded,
                Some(e.to_string()),
                false,
            ),
            Ok(text) => match scrub(&text) {
                ScrubOutcome::Approved(text) => (text, Disposition::Completed, None, false),
                ScrubOutcome::Blocked { fallback, violation } => {
                    (fallback, Disposition::Scrubbed, Some(violation.as_str().to_string()), true)
                }
            },
        };

        self.remember(session, &draft.safe_text, Some(&response)).await;
        let turn = Turn {
            index,
            user_text: draft.raw.to_string(),
            safe_text: draft.safe_text,
            timestamp: Utc::now(),
            signals: Some(draft.signals),
            plan: Some(plan),
            tool_results: results,
            response,
            disposition,
            reason,
            flagged_for_review: flagged,
        };
        self.finish(session, turn, draft.started)
    }

    async fn hard_stop(
        &self,
        session: &mut Session,
        raw: &str,
        reason: BlockReason,
        response: &'static str,
        started: Instant,
    ) -> TurnOutcome {
        metrics::inc_hard_stop(reason.code());
        // Every hard stop is an observed turn; only a crisis sets the override.
        let risk_override = reason
            .is_crisis()
            .then(|| RiskOverride::Crisis { reason: reason.code().to_string() });
        session.clinical.update(&[], risk_override);
        session
            .memory
            .record_blocked_turn(self.generator.as_ref(), self.settings.generation_timeout)
            .await;

        let turn = Turn {
            index: session.next_turn_index(),
            user_text: raw.to_string(),
            safe_text: String::new(),
            timestamp: Utc::now(),
            signals: None,
            plan: None,
            tool_results: Vec::new(),
            response: response.to_string(),
            disposition: Disposition::Blocked,
            reason: Some(reason.code().to_string()),
            flagged_for_review: reason.is_crisis(),
        };
        self.finish(session, turn, started)
    }

    /// Clinical and mood updates already happened; keep them, record the
    /// user message, and produce no reply.
    async fn cancelled(
        &self,
        session: &mut Session,
        draft: PendingTurn<'_>,
        plan: Option<ExecutionPlan>,
        results: Vec<ToolResult>,
    ) -> TurnOutcome {
        warn!("Session {} turn cancelled before a reply was produced", session.id);
        self.remember(session, &draft.safe_text, None).await;
        let turn = Turn {
            index: session.next_turn_index(),
            user_text: draft.raw.to_string(),
            safe_text: draft.safe_text,
            timestamp: Utc::now(),
            signals: Some(draft.signals),
            plan,
            tool_results: results,
            response: String::new(),
            disposition: Disposition::Cancelled,
            reason: Some("cancelled".to_string()),
            flagged_for_review: false,
        };
        self.finish(session, turn, draft.started)
    }

    async fn remember(&self, session: &mut Session, user: &str, reply: Option<&str>) {
        session
            .memory
            .append(user, reply, self.generator.as_ref(), self.settings.generation_timeout)
            .await;
    }

    fn finish(&self, session: &mut Session, turn: Turn, started: Instant) -> TurnOutcome {
        let latency_ms = started.elapsed().as_millis() as u64;
        metrics::inc_turn(turn.disposition.as_str());

        self.trace.emit(TraceRecord {
            trace_id: uuid::Uuid::new_v4().to_string(),
            session_id: Some(session.id.clone()),
            component: TURN_TRACE_COMPONENT.to_string(),
            prompt_context: turn.safe_text.clone(),
            response: turn.response.clone(),
            success: matches!(turn.disposition, Disposition::Completed | Disposition::Blocked),
            latency_ms,
            timestamp: turn.timestamp,
        });

        info!(
            "Session {} turn {} {} in {}ms (risk {})",
            session.id,
            turn.index,
            turn.disposition.as_str(),
            latency_ms,
            session.clinical.risk.as_str()
        );

        let outcome = TurnOutcome {
            turn_index: turn.index,
            response: turn.response.clone(),
            disposition: turn.disposition,
            flagged_for_review: turn.flagged_for_review,
            risk: session.clinical.risk,
        };
        session.push_turn(turn);
        outcome
    }
}

/// State carried between the stages of a turn that passed the gate.
struct PendingTurn<'a> {
    raw: &'a str,
    safe_text: String,
    signals: TurnSignals,
    started: Instant,
}

fn apply_memory_writes(session: &mut Session, results: &[ToolResult]) {
    for result in results.iter().filter(|r| r.success) {
        if let Some(ToolPayload::Note { text }) = &result.payload {
            if session.memory.pin_note(text) {
                debug!("Pinned note for session {}", session.id);
            }
        }
    }
}

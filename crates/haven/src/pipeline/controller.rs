//! Rule-based tool selection.
//!
//! The controller turns what was observed about a message into an ordered
//! plan. It never runs tools. Every input yields a plan, and every plan ends
//! in exactly one synthesis step.

use crate::clinical::{ClinicalState, RiskLevel};
use crate::lexicon::{
    EmotionLabel, HELP_SEEKING_PHRASES, MEMORY_REFERENCE_PHRASES, MEMORY_WRITE_PHRASES,
    RESOURCE_PHRASES,
};
use crate::memory::MemorySnapshot;
use crate::signals::{Polarity, PrimaryEmotion, Trend, TurnSignals};
use crate::tools::ToolKind;
use crate::utils::TextUtils;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub tool: ToolKind,
    pub rationale: String,
}

/// Ordered tool steps followed by the single terminal synthesis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    steps: Vec<PlanStep>,
    synthesis_rationale: String,
}

impl ExecutionPlan {
    pub fn synthesis_only(rationale: impl Into<String>) -> Self {
        Self { steps: Vec::new(), synthesis_rationale: rationale.into() }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn tools(&self) -> Vec<ToolKind> {
        self.steps.iter().map(|s| s.tool).collect()
    }

    pub fn contains(&self, tool: ToolKind) -> bool {
        self.steps.iter().any(|s| s.tool == tool)
    }

    pub fn synthesis_rationale(&self) -> &str {
        &self.synthesis_rationale
    }

    pub fn is_synthesis_only(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Inputs to one planning decision.
pub struct PlanRequest<'a> {
    pub safe_text: &'a str,
    pub signals: &'a TurnSignals,
    pub clinical: &'a ClinicalState,
    pub memory: &'a MemorySnapshot,
    pub available: &'a [ToolKind],
}

struct PlanBuilder<'a> {
    available: &'a [ToolKind],
    steps: Vec<PlanStep>,
}

impl PlanBuilder<'_> {
    fn add(&mut self, tool: ToolKind, rationale: &str) {
        if !self.available.contains(&tool) || self.steps.iter().any(|s| s.tool == tool) {
            return;
        }
        self.steps.push(PlanStep { tool, rationale: rationale.to_string() });
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Controller;

impl Controller {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, request: &PlanRequest<'_>) -> ExecutionPlan {
        let folded = TextUtils::fold(request.safe_text);
        let words = TextUtils::word_set(&folded);
        let mentions = |phrases: &[&str]| {
            phrases.iter().any(|p| TextUtils::matches_keyword(&folded, &words, p))
        };

        let signals = request.signals;
        let help_seeking = mentions(HELP_SEEKING_PHRASES);
        let wants_resources = mentions(RESOURCE_PHRASES);
        let asks_to_remember = mentions(MEMORY_WRITE_PHRASES);
        let refers_back = !asks_to_remember && mentions(MEMORY_REFERENCE_PHRASES);

        let mut plan = PlanBuilder { available: request.available, steps: Vec::new() };

        if signals.has_soft_crisis() {
            plan.add(ToolKind::EmotionDecomposition, "message carries hopelessness language");
            plan.add(ToolKind::InterventionSelection, "offer a grounding, low-pressure next step");
            plan.add(ToolKind::ResourceKnowledge, "make support options easy to find");
        }

        if !signals.symptoms.is_empty() || request.clinical.risk >= RiskLevel::Moderate {
            plan.add(ToolKind::SymptomScreening, "symptom indicators present or accumulated");
        }

        let mixed_emotions = signals.emotion.labels.len() > 1
            || signals.emotion.primary == PrimaryEmotion::Distressed
            || signals.emotion.labels.contains(&EmotionLabel::Hopelessness);
        if mixed_emotions {
            plan.add(ToolKind::EmotionDecomposition, "several emotions to untangle");
        }

        if signals.sentiment.polarity == Polarity::Negative && signals.sentiment.confidence >= 0.5 {
            plan.add(ToolKind::PolarityScoring, "strongly negative tone");
        }

        if signals.pattern.has_repetition() || signals.pattern.sentiment_trend == Trend::Declining {
            plan.add(ToolKind::PatternDetection, "recurring theme or declining tone");
        }

        if help_seeking {
            plan.add(ToolKind::TherapyKnowledge, "explicit request for coping help");
            plan.add(ToolKind::InterventionSelection, "match a technique to the emotions present");
        } else if matches!(signals.emotion.primary, PrimaryEmotion::Struggling) {
            plan.add(ToolKind::TherapyKnowledge, "struggling without a specific emotion");
        }

        if wants_resources || request.clinical.risk == RiskLevel::High {
            plan.add(ToolKind::ResourceKnowledge, "professional or community support is relevant");
        }

        if asks_to_remember {
            plan.add(ToolKind::MemoryWrite, "asked to keep something in mind");
        }
        if refers_back && !request.memory.is_empty() {
            plan.add(ToolKind::MemoryRead, "refers to earlier conversation");
        }

        let synthesis_rationale = if plan.steps.is_empty() {
            "no specific need detected; respond conversationally".to_string()
        } else {
            format!("combine {} tool contributions into one reply", plan.steps.len())
        };

        debug!(
            "Plan: [{}] -> synthesis",
            plan.steps.iter().map(|s| s.tool.internal_name()).collect::<Vec<_>>().join(", ")
        );

        ExecutionPlan { steps: plan.steps, synthesis_rationale }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Message;
    use crate::signals;
    use proptest::prelude::*;

    fn plan_for(text: &str, clinical: &ClinicalState, memory: &MemorySnapshot, available: &[ToolKind]) -> ExecutionPlan {
        let signals = signals::extract(text, &memory.recent_messages, &[]);
        Controller::new().plan(&PlanRequest {
            safe_text: text,
            signals: &signals,
            clinical,
            memory,
            available,
        })
    }

    fn plan(text: &str) -> ExecutionPlan {
        plan_for(text, &ClinicalState::new(), &MemorySnapshot::default(), &ToolKind::ALL)
    }

    #[test]
    fn test_small_talk_is_synthesis_only() {
        assert!(plan("hi, how is your day going").is_synthesis_only());
    }

    #[test]
    fn test_help_seeking_selects_therapy_and_interventions() {
        let plan = plan("I'm so anxious, what can I do to calm down?");
        assert!(plan.contains(ToolKind::TherapyKnowledge));
        assert!(plan.contains(ToolKind::InterventionSelection));
        assert!(plan.contains(ToolKind::SymptomScreening));
    }

    #[test]
    fn test_resource_request_selects_resource_knowledge() {
        assert!(plan("how do I find a therapist near me").contains(ToolKind::ResourceKnowledge));
    }

    #[test]
    fn test_soft_crisis_is_an_ordinary_feature() {
        let text = "everything feels hopeless";
        let signals = signals::extract(text, &[], &["hopeless".to_string()]);
        let plan = Controller::new().plan(&PlanRequest {
            safe_text: text,
            signals: &signals,
            clinical: &ClinicalState::new(),
            memory: &MemorySnapshot::default(),
            available: &ToolKind::ALL,
        });
        assert_eq!(plan.steps()[0].tool, ToolKind::EmotionDecomposition);
        assert!(plan.contains(ToolKind::ResourceKnowledge));
    }

    #[test]
    fn test_memory_tools() {
        assert!(plan("please remember that my dog is called Max").contains(ToolKind::MemoryWrite));
        assert!(!plan("like I mentioned earlier").contains(ToolKind::MemoryRead));

        let memory = MemorySnapshot {
            recent_messages: vec![Message::user("my job"), Message::assistant("tell me more")],
            turn_count: 1,
            ..MemorySnapshot::default()
        };
        let plan = plan_for("like I mentioned earlier", &ClinicalState::new(), &memory, &ToolKind::ALL);
        assert!(plan.contains(ToolKind::MemoryRead));
    }

    #[test]
    fn test_unregistered_tools_are_never_planned() {
        let available = [ToolKind::SymptomScreening];
        let plan = plan_for(
            "I'm sad, what can I do? maybe a therapist?",
            &ClinicalState::new(),
            &MemorySnapshot::default(),
            &available,
        );
        assert_eq!(plan.tools(), vec![ToolKind::SymptomScreening]);
    }

    proptest! {
        #[test]
        fn prop_plan_is_total_and_valid(text in "\\PC{0,200}", mask in 0u16..512) {
            let available: Vec<ToolKind> = ToolKind::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, k)| *k)
                .collect();
            let plan = plan_for(&text, &ClinicalState::new(), &MemorySnapshot::default(), &available);
            let tools = plan.tools();
            prop_assert!(tools.iter().all(|t| available.contains(t)));
            let mut deduped = tools.clone();
            deduped.sort();
            deduped.dedup();
            prop_assert_eq!(deduped.len(), tools.len());
            prop_assert!(!plan.synthesis_rationale().is_empty());
        }
    }
}

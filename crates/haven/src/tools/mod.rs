//! Tools the controller can put in a plan.
//!
//! The set is closed: [`ToolKind`] names every capability, [`Tool`] is the
//! runnable variant, and [`ToolRegistry`] maps one to the other. Tools never
//! see the raw user message, only the [`ToolContext`] built after the safety
//! gate.

pub mod analytic;
pub mod engine;
pub mod knowledge;
pub mod registry;

pub use engine::ToolEngine;
pub use knowledge::KnowledgeTool;
pub use registry::{Tool, ToolRegistry};

use crate::clinical::{ClinicalState, RiskLevel, ScreeningBand};
use crate::memory::MemorySnapshot;
use crate::signals::{Engagement, Polarity, PrimaryEmotion, Trend, TurnSignals, Urgency};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    EmotionDecomposition,
    PolarityScoring,
    PatternDetection,
    SymptomScreening,
    TherapyKnowledge,
    ResourceKnowledge,
    MemoryRead,
    MemoryWrite,
    InterventionSelection,
}

impl ToolKind {
    pub const ALL: [ToolKind; 9] = [
        ToolKind::EmotionDecomposition,
        ToolKind::PolarityScoring,
        ToolKind::PatternDetection,
        ToolKind::SymptomScreening,
        ToolKind::TherapyKnowledge,
        ToolKind::ResourceKnowledge,
        ToolKind::MemoryRead,
        ToolKind::MemoryWrite,
        ToolKind::InterventionSelection,
    ];

    /// Identifier used in plans, traces and metrics. Never shown to users.
    pub fn internal_name(&self) -> &'static str {
        match self {
            ToolKind::EmotionDecomposition => "emotion_decomposition",
            ToolKind::PolarityScoring => "polarity_scoring",
            ToolKind::PatternDetection => "pattern_detection",
            ToolKind::SymptomScreening => "symptom_screening",
            ToolKind::TherapyKnowledge => "therapy_knowledge",
            ToolKind::ResourceKnowledge => "resource_knowledge",
            ToolKind::MemoryRead => "memory_read",
            ToolKind::MemoryWrite => "memory_write",
            ToolKind::InterventionSelection => "intervention_selection",
        }
    }

    pub fn is_knowledge(&self) -> bool {
        matches!(self, ToolKind::TherapyKnowledge | ToolKind::ResourceKnowledge)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.internal_name())
    }
}

/// Everything a tool may read. Built once per turn and shared by all tools
/// of the plan.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub safe_text: String,
    pub signals: TurnSignals,
    pub memory: MemorySnapshot,
    pub clinical: ClinicalState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenedTheme {
    pub theme: String,
    pub mentions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub name: String,
    pub description: String,
}

/// Structured output of one tool. The shape depends on the tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolPayload {
    Emotions {
        primary: PrimaryEmotion,
        secondary: Vec<String>,
        urgency: Urgency,
        intensity: f64,
    },
    Polarity {
        score: f64,
        polarity: Polarity,
        confidence: f64,
    },
    Patterns {
        recurring_topics: Vec<String>,
        trend: Trend,
        engagement: Engagement,
        repeated_message: bool,
    },
    Screening {
        themes: Vec<ScreenedTheme>,
        depressive_band: ScreeningBand,
        anxious_band: ScreeningBand,
        risk: RiskLevel,
    },
    Knowledge {
        sources: Vec<String>,
        contribution: String,
    },
    Recall {
        summaries: Vec<String>,
        notes: Vec<String>,
        earlier_user_message: Option<String>,
    },
    Note {
        text: String,
    },
    Interventions {
        suggestions: Vec<Intervention>,
    },
}

impl ToolPayload {
    pub fn empty_knowledge() -> Self {
        ToolPayload::Knowledge { sources: Vec::new(), contribution: String::new() }
    }

    /// Prompt-ready text for the synthesizer. `None` when the payload has
    /// nothing worth passing on. Screening and risk details are turned into
    /// plain descriptions of what the person talked about.
    pub fn render(&self) -> Option<String> {
        match self {
            ToolPayload::Emotions { primary, secondary, urgency, .. } => {
                let mut line = format!("They mostly come across as {}", primary);
                if !secondary.is_empty() {
                    line.push_str(&format!(", with some {}", secondary.join(", ")));
                }
                if *urgency == Urgency::High {
                    line.push_str("; the feelings seem intense right now");
                }
                Some(line + ".")
            }
            ToolPayload::Polarity { polarity, .. } => Some(match polarity {
                Polarity::Positive => "The overall tone of the message is hopeful.".to_string(),
                Polarity::Neutral => "The overall tone of the message is even.".to_string(),
                Polarity::Negative => "The overall tone of the message is heavy.".to_string(),
            }),
            ToolPayload::Patterns { recurring_topics, repeated_message, .. } => {
                if recurring_topics.is_empty() && !repeated_message {
                    return None;
                }
                let mut line = String::new();
                if !recurring_topics.is_empty() {
                    line.push_str(&format!("They keep coming back to {}.", recurring_topics.join(" and ")));
                }
                if *repeated_message {
                    line.push_str(" They have said something very similar before; acknowledge it rather than repeating earlier replies.");
                }
                Some(line.trim().to_string())
            }
            ToolPayload::Screening { themes, .. } => {
                if themes.is_empty() {
                    return None;
                }
                let names: Vec<&str> = themes.iter().map(|t| t.theme.as_str()).collect();
                Some(format!("Themes worth acknowledging gently: {}.", names.join(", ")))
            }
            ToolPayload::Knowledge { contribution, .. } => {
                (!contribution.is_empty()).then(|| contribution.clone())
            }
            ToolPayload::Recall { summaries, notes, earlier_user_message } => {
                let mut parts = Vec::new();
                if let Some(last) = summaries.last() {
                    parts.push(format!("Earlier: {}", last));
                }
                if !notes.is_empty() {
                    parts.push(format!("They asked you to remember: {}", notes.join("; ")));
                }
                if let Some(message) = earlier_user_message {
                    parts.push(format!("Previously they said: \"{}\"", message));
                }
                (!parts.is_empty()).then(|| parts.join("\n"))
            }
            ToolPayload::Note { text } => Some(format!("They asked you to keep this in mind: {}", text)),
            ToolPayload::Interventions { suggestions } => {
                let lines: Vec<String> = suggestions
                    .iter()
                    .map(|s| format!("- {}: {}", s.name, s.description))
                    .collect();
                Some(format!("Approaches that might fit:\n{}", lines.join("\n")))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: ToolKind,
    pub payload: Option<ToolPayload>,
    pub success: bool,
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl ToolResult {
    pub fn ok(tool: ToolKind, payload: ToolPayload, latency_ms: u64) -> Self {
        Self { tool, payload: Some(payload), success: true, error: None, latency_ms }
    }

    pub fn failed(tool: ToolKind, error: impl Into<String>, latency_ms: u64) -> Self {
        Self { tool, payload: None, success: false, error: Some(error.into()), latency_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_names_are_unique() {
        let mut names: Vec<&str> = ToolKind::ALL.iter().map(|k| k.internal_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ToolKind::ALL.len());
    }

    #[test]
    fn test_empty_knowledge_renders_nothing() {
        assert_eq!(ToolPayload::empty_knowledge().render(), None);
    }

    #[test]
    fn test_screening_render_uses_plain_language() {
        let payload = ToolPayload::Screening {
            themes: vec![ScreenedTheme { theme: "trouble sleeping".into(), mentions: 3 }],
            depressive_band: ScreeningBand::Moderate,
            anxious_band: ScreeningBand::Mild,
            risk: RiskLevel::Moderate,
        };
        let text = payload.render().unwrap();
        assert!(text.contains("trouble sleeping"));
        assert!(!text.to_lowercase().contains("moderate"));
    }

    #[test]
    fn test_payload_serializes_with_type_tag() {
        let json = serde_json::to_value(ToolPayload::Note { text: "x".into() }).unwrap();
        assert_eq!(json["type"], "note");
    }
}

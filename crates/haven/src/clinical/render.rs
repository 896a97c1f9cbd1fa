//! Soft-language rendering of the clinical estimate for the synthesis prompt.
//!
//! The rendered text only carries qualitative descriptors. Category names,
//! scores, screening numbers and risk labels never appear in it.

use super::{ClinicalState, MoodGuidance, MoodSeries, RiskLevel, ScreeningBand};
use crate::lexicon::SymptomCategory;
use crate::signals::Trend;

/// Clinical background prepared for one synthesis call.
#[derive(Debug, Clone)]
pub struct ClinicalContext {
    pub observations: Vec<String>,
    pub overall: &'static str,
    pub guidance: MoodGuidance,
}

impl ClinicalContext {
    pub fn from_state(state: &ClinicalState, mood: &MoodSeries) -> Self {
        let observations = state
            .ranked_categories()
            .into_iter()
            .take(3)
            .map(|(category, tally)| {
                format!("{} {}", describe(category), frequency(tally.score))
            })
            .collect();

        let screening = state.screening();
        let elevated = screening.depressive_band() >= ScreeningBand::Moderate
            || screening.anxious_band() >= ScreeningBand::Moderate;

        let overall = match (state.risk, elevated) {
            (RiskLevel::High, _) => {
                "They seem to be under a great deal of strain. Prioritise warmth and safety, and gently encourage reaching out to people or services who can support them."
            }
            (RiskLevel::Moderate, _) | (RiskLevel::Low, true) => {
                "They have been carrying a noticeable emotional load across this conversation."
            }
            (RiskLevel::Low, false) => "They seem to be managing, with some everyday stress.",
        };

        Self {
            observations,
            overall,
            guidance: mood.guidance(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(self.overall);
        out.push('\n');
        for line in &self.observations {
            out.push_str("- They ");
            out.push_str(line);
            out.push_str(".\n");
        }
        let trend = match self.guidance.trend {
            Trend::EstablishingBaseline => "It is still early in the conversation.",
            Trend::Improving => "Their mood seems to be lifting recently.",
            Trend::Declining => "Their mood seems to have been dipping recently.",
            Trend::Stable => "Their mood has been fairly steady recently.",
        };
        out.push_str(trend);
        out.push('\n');
        out.push_str(&format!(
            "Respond in a {} way and {}.",
            self.guidance.tone, self.guidance.approach
        ));
        if let Some(caution) = self.guidance.caution {
            out.push_str(&format!(" Please {}.", caution));
        }
        out
    }
}

fn describe(category: SymptomCategory) -> &'static str {
    match category {
        SymptomCategory::DepressedMood => "have mentioned feeling low or down",
        SymptomCategory::Anxiety => "have described feeling worried or on edge",
        SymptomCategory::Sleep => "have mentioned trouble getting rest",
        SymptomCategory::Appetite => "have mentioned changes in eating",
        SymptomCategory::Concentration => "have found it hard to focus",
        SymptomCategory::Energy => "have described feeling drained",
        SymptomCategory::Irritability => "have felt short-tempered",
        SymptomCategory::SelfHarmIdeation => "have talked about wanting to withdraw from everything",
    }
}

fn frequency(score: f64) -> &'static str {
    if score < 3.0 {
        "once or twice"
    } else if score < 8.0 {
        "several times"
    } else {
        "persistently"
    }
}

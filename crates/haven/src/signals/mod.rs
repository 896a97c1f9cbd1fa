//! Stateless signal extractors.
//!
//! Each extractor is a pure function of the sanitized message and the recent
//! conversation window. [`extract`] runs all of them and bundles the output
//! into [`TurnSignals`], which flows into the clinical tracker, the
//! controller and the tools.

pub mod emotion;
pub mod pattern;
pub mod sentiment;
pub mod symptom;

pub use emotion::{EmotionSignal, PrimaryEmotion, Urgency};
pub use pattern::{Engagement, PatternSignal};
pub use sentiment::{Polarity, SentimentSignal};
pub use symptom::{SeverityModifiers, SymptomSignal};

use crate::memory::Message;
use serde::{Deserialize, Serialize};

const TREND_WINDOW: usize = 5;
const TREND_MARGIN: f64 = 0.15;
const MIN_TREND_POINTS: usize = 3;

/// Direction of a valence series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    EstablishingBaseline,
    Improving,
    Declining,
    Stable,
}

impl Trend {
    /// Compares the mean of the first two against the mean of the last two
    /// of the latest five values.
    pub fn classify(values: &[f64]) -> Trend {
        if values.len() < MIN_TREND_POINTS {
            return Trend::EstablishingBaseline;
        }
        let recent = &values[values.len().saturating_sub(TREND_WINDOW)..];
        let early = (recent[0] + recent[1]) / 2.0;
        let late = (recent[recent.len() - 2] + recent[recent.len() - 1]) / 2.0;

        if late > early + TREND_MARGIN {
            Trend::Improving
        } else if late < early - TREND_MARGIN {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::EstablishingBaseline => "establishing_baseline",
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        }
    }
}

/// Everything the extractors found in one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSignals {
    pub emotion: EmotionSignal,
    pub sentiment: SentimentSignal,
    pub pattern: PatternSignal,
    pub symptoms: Vec<SymptomSignal>,
    pub severity: SeverityModifiers,
    /// Soft-tier crisis phrases forwarded from the safety gate.
    pub soft_crisis: Vec<String>,
}

impl TurnSignals {
    pub fn has_soft_crisis(&self) -> bool {
        !self.soft_crisis.is_empty()
    }
}

pub fn extract(safe_text: &str, history: &[Message], soft_crisis: &[String]) -> TurnSignals {
    let labels = emotion::detect_labels(safe_text);
    let sentiment = sentiment::score(safe_text, &labels);
    let emotion = emotion::classify(labels, &sentiment, !soft_crisis.is_empty());
    let severity = SeverityModifiers::detect(safe_text);
    let symptoms = symptom::extract(safe_text, &severity);
    let pattern = pattern::detect(safe_text, history);

    TurnSignals {
        emotion,
        sentiment,
        pattern,
        symptoms,
        severity,
        soft_crisis: soft_crisis.to_vec(),
    }
}

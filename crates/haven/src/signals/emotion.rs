use super::sentiment::SentimentSignal;
use crate::lexicon::EmotionLabel;
use crate::utils::TextUtils;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dominant emotional state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryEmotion {
    Distressed,
    Specific(EmotionLabel),
    Struggling,
    Coping,
    Neutral,
}

impl PrimaryEmotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryEmotion::Distressed => "distressed",
            PrimaryEmotion::Specific(label) => label.as_str(),
            PrimaryEmotion::Struggling => "struggling",
            PrimaryEmotion::Coping => "coping",
            PrimaryEmotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for PrimaryEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Moderate,
    High,
}

impl Urgency {
    fn base_intensity(&self) -> f64 {
        match self {
            Urgency::Low => 0.2,
            Urgency::Moderate => 0.5,
            Urgency::High => 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSignal {
    pub primary: PrimaryEmotion,
    /// Every emotion detected, in lexicon order.
    pub labels: Vec<EmotionLabel>,
    pub urgency: Urgency,
    /// Strength in [0, 1].
    pub intensity: f64,
}

impl EmotionSignal {
    /// Labels other than the primary one.
    pub fn secondary(&self) -> Vec<EmotionLabel> {
        self.labels
            .iter()
            .copied()
            .filter(|l| PrimaryEmotion::Specific(*l) != self.primary)
            .collect()
    }
}

pub fn detect_labels(safe_text: &str) -> Vec<EmotionLabel> {
    let folded = TextUtils::fold(safe_text);
    let words = TextUtils::word_set(&folded);
    EmotionLabel::ALL
        .iter()
        .copied()
        .filter(|label| {
            label
                .keywords()
                .iter()
                .any(|k| TextUtils::matches_keyword(&folded, &words, k))
        })
        .collect()
}

pub fn classify(
    labels: Vec<EmotionLabel>,
    sentiment: &SentimentSignal,
    soft_crisis: bool,
) -> EmotionSignal {
    let has = |label: EmotionLabel| labels.contains(&label);

    let distressed = soft_crisis
        || has(EmotionLabel::Hopelessness)
        || (has(EmotionLabel::Anger) && labels.len() > 1);

    let primary = if distressed {
        PrimaryEmotion::Distressed
    } else if let Some(label) = EmotionLabel::SEVERITY_ORDER.iter().copied().find(|l| has(*l)) {
        PrimaryEmotion::Specific(label)
    } else if sentiment.score < -0.2 {
        PrimaryEmotion::Struggling
    } else if sentiment.score > 0.2 {
        PrimaryEmotion::Coping
    } else {
        PrimaryEmotion::Neutral
    };

    let urgency = if soft_crisis || has(EmotionLabel::Hopelessness) {
        Urgency::High
    } else if labels.len() >= 2 || sentiment.score <= -0.5 {
        Urgency::Moderate
    } else {
        Urgency::Low
    };

    let breadth = 0.05 * labels.len().saturating_sub(1) as f64;
    let valence = (-sentiment.score).max(0.0) * 0.2;
    let intensity = (urgency.base_intensity() + breadth + valence).clamp(0.0, 1.0);

    EmotionSignal { primary, labels, urgency, intensity }
}

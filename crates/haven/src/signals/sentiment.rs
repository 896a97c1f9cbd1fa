use crate::lexicon::{EmotionLabel, NEGATIVE_WORDS, POSITIVE_WORDS};
use crate::utils::TextUtils;
use serde::{Deserialize, Serialize};

const POLARITY_MARGIN: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Neutral,
    Negative,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Neutral => "neutral",
            Polarity::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSignal {
    /// Valence in [-1, 1].
    pub score: f64,
    pub polarity: Polarity,
    /// How much lexical evidence backs the score, in [0, 1].
    pub confidence: f64,
}

impl SentimentSignal {
    pub fn neutral() -> Self {
        Self { score: 0.0, polarity: Polarity::Neutral, confidence: 0.0 }
    }
}

/// Lexical valence, nudged negative by emotions that carry extra weight.
pub fn score(safe_text: &str, emotions: &[EmotionLabel]) -> SentimentSignal {
    let folded = TextUtils::fold(safe_text);
    let words = TextUtils::word_set(&folded);

    let positive = POSITIVE_WORDS.iter().filter(|w| words.contains(*w)).count() as f64;
    let negative_words = NEGATIVE_WORDS.iter().filter(|w| words.contains(*w)).count() as f64;
    let boost: f64 = emotions.iter().map(EmotionLabel::negative_boost).sum();
    let negative = negative_words + boost;
    let total = positive + negative;

    let (score, confidence) = if total > 0.0 {
        let matched = positive + negative_words;
        ((positive - negative) / total, (matched.max(1.0) / 3.0).min(1.0))
    } else if !emotions.is_empty() {
        (-0.5, 0.3)
    } else {
        (0.0, 0.0)
    };

    SentimentSignal {
        score,
        polarity: polarity_of(score),
        confidence,
    }
}

pub fn polarity_of(score: f64) -> Polarity {
    if score > POLARITY_MARGIN {
        Polarity::Positive
    } else if score < -POLARITY_MARGIN {
        Polarity::Negative
    } else {
        Polarity::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_text() {
        let s = score("I feel calm and grateful today", &[]);
        assert_eq!(s.polarity, Polarity::Positive);
        assert!((s.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mixed_text_with_boost_turns_negative() {
        let s = score("things are okay but I feel betrayed", &[EmotionLabel::Betrayal]);
        // one positive word against a +2 betrayal boost
        assert_eq!(s.polarity, Polarity::Negative);
        assert!(s.score < -0.2);
    }

    #[test]
    fn test_emotions_without_sentiment_words() {
        let s = score("my dog passed away", &[EmotionLabel::Grief]);
        assert_eq!(s.score, -0.5);
        assert_eq!(s.polarity, Polarity::Negative);
    }

    #[test]
    fn test_no_evidence_is_neutral() {
        let s = score("the bus was late", &[]);
        assert_eq!(s, SentimentSignal::neutral());
    }

    #[test]
    fn test_score_bounded() {
        let s = score("awful terrible bad worse hate", &[EmotionLabel::Shame, EmotionLabel::Anger]);
        assert!(s.score >= -1.0 && s.score <= 1.0);
        assert!(s.confidence <= 1.0);
    }
}

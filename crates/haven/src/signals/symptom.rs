use crate::lexicon::{
    SymptomCategory, INTENSIFIERS, MAX_CONTRIBUTION_PER_MESSAGE, MAX_SEVERITY_MULTIPLIER,
    PERSISTENCE_PHRASES, SEVERITY_FACTOR,
};
use crate::utils::TextUtils;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomSignal {
    pub category: SymptomCategory,
    pub matched: Vec<String>,
    /// Severity multiplier applied to the base weight, already capped.
    pub multiplier: f64,
    /// Score this message adds to the category, already capped.
    pub contribution: f64,
    pub confidence: f64,
}

/// Severity modifiers present in a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityModifiers {
    pub intensifiers: Vec<String>,
    pub persistence: Vec<String>,
}

impl SeverityModifiers {
    pub fn detect(safe_text: &str) -> Self {
        let folded = TextUtils::fold(safe_text);
        let words = TextUtils::word_set(&folded);
        let find = |list: &[&str]| -> Vec<String> {
            list.iter()
                .filter(|k| TextUtils::matches_keyword(&folded, &words, k))
                .map(|k| k.to_string())
                .collect()
        };
        Self {
            intensifiers: find(INTENSIFIERS),
            persistence: find(PERSISTENCE_PHRASES),
        }
    }

    pub fn multiplier(&self) -> f64 {
        let mut multiplier = 1.0;
        if !self.intensifiers.is_empty() {
            multiplier *= SEVERITY_FACTOR;
        }
        if !self.persistence.is_empty() {
            multiplier *= SEVERITY_FACTOR;
        }
        multiplier.min(MAX_SEVERITY_MULTIPLIER)
    }
}

/// Multi-label: every category with at least one keyword hit yields its own signal.
pub fn extract(safe_text: &str, modifiers: &SeverityModifiers) -> Vec<SymptomSignal> {
    let folded = TextUtils::fold(safe_text);
    let words = TextUtils::word_set(&folded);
    let multiplier = modifiers.multiplier();

    SymptomCategory::ALL
        .iter()
        .filter_map(|category| {
            let matched: Vec<String> = category
                .keywords()
                .iter()
                .filter(|k| TextUtils::matches_keyword(&folded, &words, k))
                .map(|k| k.to_string())
                .collect();
            if matched.is_empty() {
                return None;
            }
            let contribution =
                (category.base_weight() * multiplier).min(MAX_CONTRIBUTION_PER_MESSAGE);
            let confidence = (0.5 + 0.15 * (matched.len() - 1) as f64).min(1.0);
            Some(SymptomSignal {
                category: *category,
                matched,
                multiplier,
                contribution,
                confidence,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(text: &str) -> Vec<SymptomCategory> {
        extract(text, &SeverityModifiers::detect(text))
            .into_iter()
            .map(|s| s.category)
            .collect()
    }

    #[test]
    fn test_low_mood_and_low_energy_are_separate_signals() {
        let found = categories("I've been feeling sad and down, and I have no energy");
        assert!(found.contains(&SymptomCategory::DepressedMood));
        assert!(found.contains(&SymptomCategory::Energy));
        assert!(found.len() >= 2);
    }

    #[test]
    fn test_tired_counts_for_sleep_and_energy() {
        let found = categories("so tired lately");
        assert_eq!(found, vec![SymptomCategory::Sleep, SymptomCategory::Energy]);
    }

    #[test]
    fn test_no_symptoms_in_neutral_text() {
        assert!(categories("we watched a film").is_empty());
    }

    #[test]
    fn test_single_modifier_multiplies() {
        let text = "I'm always anxious";
        let signals = extract(text, &SeverityModifiers::detect(text));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].multiplier, 1.5);
        assert_eq!(signals[0].contribution, 3.0);
    }

    #[test]
    fn test_stacked_modifiers_are_capped() {
        let text = "I am extremely anxious and depressed every day, it never stops, always";
        let modifiers = SeverityModifiers::detect(text);
        assert_eq!(modifiers.multiplier(), MAX_SEVERITY_MULTIPLIER);
        for signal in extract(text, &modifiers) {
            assert!(signal.contribution <= MAX_CONTRIBUTION_PER_MESSAGE);
        }
    }

    #[test]
    fn test_confidence_grows_with_matches() {
        let text = "anxious, worried, nervous";
        let signals = extract(text, &SeverityModifiers::default());
        assert_eq!(signals[0].category, SymptomCategory::Anxiety);
        assert!((signals[0].confidence - 0.8).abs() < 1e-9);
    }
}

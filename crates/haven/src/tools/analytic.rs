//! Deterministic tools computed from the turn's signals, clinical state and
//! memory. None of these suspend or fail.

use super::{Intervention, ScreenedTheme, ToolContext, ToolPayload};
use crate::lexicon::{EmotionLabel, SymptomCategory, MEMORY_WRITE_PHRASES};
use crate::memory::Role;
use crate::signals::PrimaryEmotion;
use crate::utils::TextUtils;
use lazy_static::lazy_static;
use regex::Regex;

const MAX_SCREENED_THEMES: usize = 3;
const MAX_NOTE_CHARS: usize = 200;

pub fn emotion_decomposition(ctx: &ToolContext) -> ToolPayload {
    let emotion = &ctx.signals.emotion;
    ToolPayload::Emotions {
        primary: emotion.primary,
        secondary: emotion.secondary().iter().map(|l| l.as_str().to_string()).collect(),
        urgency: emotion.urgency,
        intensity: emotion.intensity,
    }
}

pub fn polarity_scoring(ctx: &ToolContext) -> ToolPayload {
    let sentiment = &ctx.signals.sentiment;
    ToolPayload::Polarity {
        score: sentiment.score,
        polarity: sentiment.polarity,
        confidence: sentiment.confidence,
    }
}

pub fn pattern_detection(ctx: &ToolContext) -> ToolPayload {
    let pattern = &ctx.signals.pattern;
    ToolPayload::Patterns {
        recurring_topics: pattern
            .recurring_topics
            .iter()
            .map(|t| t.topic.as_str().to_string())
            .collect(),
        trend: pattern.sentiment_trend,
        engagement: pattern.engagement,
        repeated_message: pattern.repeated_message,
    }
}

pub fn symptom_screening(ctx: &ToolContext) -> ToolPayload {
    let screening = ctx.clinical.screening();
    let themes = ctx
        .clinical
        .ranked_categories()
        .into_iter()
        .take(MAX_SCREENED_THEMES)
        .map(|(category, tally)| ScreenedTheme {
            theme: category.plain_theme().to_string(),
            mentions: tally.indicator_count,
        })
        .collect();
    ToolPayload::Screening {
        themes,
        depressive_band: screening.depressive_band(),
        anxious_band: screening.anxious_band(),
        risk: ctx.clinical.risk,
    }
}

pub fn memory_read(ctx: &ToolContext) -> ToolPayload {
    // the current message is not in the snapshot yet, so the last user
    // message in the window is the previous turn
    let earlier_user_message = ctx
        .memory
        .recent_messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| TextUtils::truncate_with_ellipsis(&m.content, MAX_NOTE_CHARS).into_owned());
    ToolPayload::Recall {
        summaries: ctx.memory.summaries.iter().map(|s| s.text.clone()).collect(),
        notes: ctx.memory.notes.clone(),
        earlier_user_message,
    }
}

lazy_static! {
    /// Case-insensitive forms of the memory-write phrases, tolerant of curly
    /// apostrophes and runs of whitespace.
    static ref MEMORY_WRITE_PATTERNS: Vec<Regex> = MEMORY_WRITE_PHRASES
        .iter()
        .map(|phrase| {
            let pattern = regex::escape(phrase)
                .replace('\'', "['\u{2018}\u{2019}]")
                .replace(' ', r"\s+");
            Regex::new(&format!(r"(?i)\b{}\b", pattern)).unwrap()
        })
        .collect();
}

/// Pulls the text following a "remember that ..." style phrase, keeping the
/// user's own casing. Falls back to the whole message when no phrase is found.
pub fn memory_write(ctx: &ToolContext) -> ToolPayload {
    let text = ctx.safe_text.as_str();
    let note = MEMORY_WRITE_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.find(text).map(|m| &text[m.end()..]))
        .map(|rest| rest.trim_start_matches([':', ',', ' ']).trim())
        .find(|rest| !rest.is_empty())
        .unwrap_or(text.trim())
        .trim_end_matches(['.', '!'])
        .to_string();
    ToolPayload::Note {
        text: TextUtils::truncate_with_ellipsis(&note, MAX_NOTE_CHARS).into_owned(),
    }
}

pub fn intervention_selection(ctx: &ToolContext) -> ToolPayload {
    let labels = &ctx.signals.emotion.labels;
    let has = |category: SymptomCategory| ctx.signals.symptoms.iter().any(|s| s.category == category);

    let anxious = labels.contains(&EmotionLabel::Fear) || has(SymptomCategory::Anxiety);
    let low = labels.contains(&EmotionLabel::Sadness)
        || labels.contains(&EmotionLabel::Grief)
        || labels.contains(&EmotionLabel::Loneliness)
        || has(SymptomCategory::DepressedMood)
        || ctx.signals.emotion.primary == PrimaryEmotion::Struggling;

    let mut suggestions = Vec::new();
    if anxious {
        suggestions.push(intervention(
            "Grounding",
            "Notice five things you can see, four you can touch and three you can hear to come back to the present moment.",
        ));
        suggestions.push(intervention(
            "Paced breathing",
            "Breathe in for four counts, hold for four and breathe out slowly for six.",
        ));
    }
    if low {
        suggestions.push(intervention(
            "Validation",
            "Reflect back what they are feeling and that it makes sense given what they are going through.",
        ));
        suggestions.push(intervention(
            "Behavioural activation",
            "Invite one small, doable activity that used to bring a little comfort or sense of achievement.",
        ));
    }
    if suggestions.is_empty() {
        suggestions.push(intervention(
            "Active listening",
            "Ask an open question and reflect what you hear before offering anything else.",
        ));
    }
    ToolPayload::Interventions { suggestions }
}

fn intervention(name: &str, description: &str) -> Intervention {
    Intervention { name: name.to_string(), description: description.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinical::ClinicalState;
    use crate::memory::{MemorySnapshot, Message};
    use crate::signals;

    fn context(text: &str) -> ToolContext {
        let signals = signals::extract(text, &[], &[]);
        let mut clinical = ClinicalState::new();
        clinical.update(&signals.symptoms, None);
        ToolContext {
            safe_text: text.to_string(),
            signals,
            memory: MemorySnapshot::default(),
            clinical,
        }
    }

    #[test]
    fn test_memory_write_extracts_note() {
        let payload = memory_write(&context("Please remember that my sister is visiting on Friday."));
        assert_eq!(payload, ToolPayload::Note { text: "my sister is visiting on Friday".into() });
    }

    #[test]
    fn test_memory_write_keeps_original_casing() {
        let payload = memory_write(&context("Don\u{2019}t forget: my therapist is Dr. Alvarez at St. Mary's"));
        assert_eq!(payload, ToolPayload::Note { text: "my therapist is Dr. Alvarez at St. Mary's".into() });
    }

    #[test]
    fn test_memory_write_without_phrase_keeps_message() {
        let payload = memory_write(&context("Walks help me"));
        assert_eq!(payload, ToolPayload::Note { text: "Walks help me".into() });
    }

    #[test]
    fn test_memory_read_returns_previous_user_message() {
        let mut ctx = context("like I said before");
        ctx.memory = MemorySnapshot {
            recent_messages: vec![Message::user("work is crushing me"), Message::assistant("that sounds hard")],
            ..MemorySnapshot::default()
        };
        match memory_read(&ctx) {
            ToolPayload::Recall { earlier_user_message, .. } => {
                assert_eq!(earlier_user_message.as_deref(), Some("work is crushing me"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_interventions_follow_emotions() {
        let names = |payload: ToolPayload| match payload {
            ToolPayload::Interventions { suggestions } => {
                suggestions.into_iter().map(|s| s.name).collect::<Vec<_>>()
            }
            other => panic!("unexpected payload {:?}", other),
        };
        assert!(names(intervention_selection(&context("I'm so scared and anxious"))).contains(&"Grounding".to_string()));
        assert!(names(intervention_selection(&context("I feel sad and lonely"))).contains(&"Behavioural activation".to_string()));
        assert_eq!(names(intervention_selection(&context("hello"))), vec!["Active listening".to_string()]);
    }

    #[test]
    fn test_screening_uses_plain_themes() {
        match symptom_screening(&context("I feel sad and I can't sleep")) {
            ToolPayload::Screening { themes, .. } => {
                assert!(themes.iter().any(|t| t.theme == "feeling low"));
                assert!(themes.iter().all(|t| !t.theme.contains('_')));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}

//! Repetition and trend detection across the recent user messages.

use super::{sentiment, Trend};
use crate::lexicon::Topic;
use crate::memory::{Message, Role};
use crate::utils::TextUtils;
use serde::{Deserialize, Serialize};

/// User messages considered, including the current one.
const PATTERN_WINDOW: usize = 6;
/// Messages needed before a sentiment trend is reported.
const MIN_TREND_MESSAGES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engagement {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: Topic,
    pub mentions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSignal {
    pub current_topics: Vec<Topic>,
    /// Topics mentioned in at least two messages of the window.
    pub recurring_topics: Vec<TopicCount>,
    pub sentiment_trend: Trend,
    pub engagement: Engagement,
    /// The user sent essentially the same message earlier in the window.
    pub repeated_message: bool,
    pub messages_considered: usize,
}

impl PatternSignal {
    /// True when something in the current message has come up before.
    pub fn has_repetition(&self) -> bool {
        self.repeated_message
            || self
                .recurring_topics
                .iter()
                .any(|t| self.current_topics.contains(&t.topic))
    }
}

pub fn topics_in(text: &str) -> Vec<Topic> {
    let folded = TextUtils::fold(text);
    let words = TextUtils::word_set(&folded);
    Topic::ALL
        .iter()
        .copied()
        .filter(|topic| {
            topic
                .keywords()
                .iter()
                .any(|k| TextUtils::matches_keyword(&folded, &words, k))
        })
        .collect()
}

pub fn detect(safe_text: &str, history: &[Message]) -> PatternSignal {
    let mut window: Vec<&str> = history
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect();
    window.push(safe_text);
    let start = window.len().saturating_sub(PATTERN_WINDOW);
    let window = &window[start..];

    let current_topics = topics_in(safe_text);

    let per_message: Vec<Vec<Topic>> = window.iter().map(|m| topics_in(m)).collect();
    let recurring_topics: Vec<TopicCount> = Topic::ALL
        .iter()
        .filter_map(|topic| {
            let mentions = per_message.iter().filter(|ts| ts.contains(topic)).count();
            (mentions >= 2).then_some(TopicCount { topic: *topic, mentions })
        })
        .collect();

    let sentiment_trend = if window.len() >= MIN_TREND_MESSAGES {
        let scores: Vec<f64> = window.iter().map(|m| sentiment::score(m, &[]).score).collect();
        Trend::classify(&scores)
    } else {
        Trend::EstablishingBaseline
    };

    let avg_len = window.iter().map(|m| m.chars().count()).sum::<usize>() as f64 / window.len() as f64;
    let engagement = if avg_len > 100.0 {
        Engagement::High
    } else if avg_len > 30.0 {
        Engagement::Moderate
    } else {
        Engagement::Low
    };

    let current = TextUtils::fold(safe_text);
    let repeated_message = !current.is_empty()
        && window[..window.len() - 1]
            .iter()
            .any(|m| TextUtils::fold(m) == current);

    PatternSignal {
        current_topics,
        recurring_topics,
        sentiment_trend,
        engagement,
        repeated_message,
        messages_considered: window.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> Message {
        Message::user(text)
    }

    #[test]
    fn test_recurring_topic_across_messages() {
        let history = vec![
            user("Work has been crazy, my boss keeps piling on"),
            Message::assistant("That sounds exhausting."),
        ];
        let signal = detect("Another deadline at work today", &history);
        assert!(signal
            .recurring_topics
            .iter()
            .any(|t| t.topic == Topic::WorkStress && t.mentions == 2));
        assert!(signal.has_repetition());
    }

    #[test]
    fn test_trend_needs_enough_messages() {
        let signal = detect("hello", &[user("hi")]);
        assert_eq!(signal.sentiment_trend, Trend::EstablishingBaseline);
        assert_eq!(signal.messages_considered, 2);
    }

    #[test]
    fn test_improving_trend() {
        let history = vec![
            user("I feel awful and terrible"),
            user("still bad and upset"),
            user("a bit okay today"),
            user("feeling good and calm"),
        ];
        let signal = detect("really happy and hopeful", &history);
        assert_eq!(signal.sentiment_trend, Trend::Improving);
    }

    #[test]
    fn test_repeated_message_detected() {
        let history = vec![user("I can't sleep")];
        assert!(detect("I can't sleep", &history).repeated_message);
        assert!(!detect("I slept fine", &history).repeated_message);
    }

    #[test]
    fn test_engagement_levels() {
        assert_eq!(detect("ok", &[]).engagement, Engagement::Low);
        let long = "a".repeat(150);
        assert_eq!(detect(&long, &[]).engagement, Engagement::High);
    }

    #[test]
    fn test_window_is_bounded() {
        let history: Vec<Message> = (0..20).map(|i| user(&format!("message {}", i))).collect();
        assert_eq!(detect("now", &history).messages_considered, PATTERN_WINDOW);
    }
}

use crate::lexicon::EmotionLabel;
use crate::signals::{PrimaryEmotion, Trend, TurnSignals};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;

pub const MOOD_SERIES_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodPoint {
    pub timestamp: DateTime<Utc>,
    pub primary: PrimaryEmotion,
    pub intensity: f64,
    pub secondary: Vec<EmotionLabel>,
    /// Sentiment score of the message, in [-1, 1].
    pub valence: f64,
}

impl MoodPoint {
    pub fn from_signals(signals: &TurnSignals, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            primary: signals.emotion.primary,
            intensity: signals.emotion.intensity.clamp(0.0, 1.0),
            secondary: signals.emotion.secondary(),
            valence: signals.sentiment.score,
        }
    }
}

/// Sliding window over the latest mood points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodSeries {
    #[serde(deserialize_with = "deserialize_capped")]
    points: VecDeque<MoodPoint>,
}

/// Stored series longer than the capacity keep only their newest points.
fn deserialize_capped<'de, D>(deserializer: D) -> Result<VecDeque<MoodPoint>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut points = VecDeque::<MoodPoint>::deserialize(deserializer)?;
    let excess = points.len().saturating_sub(MOOD_SERIES_CAPACITY);
    points.drain(..excess);
    Ok(points)
}

/// How the next response should be pitched given recent mood.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodGuidance {
    pub trend: Trend,
    pub tone: &'static str,
    pub approach: &'static str,
    pub caution: Option<&'static str>,
}

impl MoodSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a point, returning the evicted oldest point on overflow.
    pub fn push(&mut self, point: MoodPoint) -> Option<MoodPoint> {
        let evicted = if self.points.len() >= MOOD_SERIES_CAPACITY {
            self.points.pop_front()
        } else {
            None
        };
        self.points.push_back(point);
        evicted
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&MoodPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MoodPoint> {
        self.points.iter()
    }

    pub fn trend(&self) -> Trend {
        let valences: Vec<f64> = self.points.iter().map(|p| p.valence).collect();
        Trend::classify(&valences)
    }

    /// Most frequent non-neutral primary emotion among the last five points.
    pub fn dominant_emotion(&self) -> Option<PrimaryEmotion> {
        let recent: Vec<PrimaryEmotion> = self
            .points
            .iter()
            .rev()
            .take(5)
            .map(|p| p.primary)
            .filter(|p| *p != PrimaryEmotion::Neutral)
            .collect();
        // first-seen (most recent) wins ties
        let mut best: Option<(PrimaryEmotion, usize)> = None;
        for candidate in &recent {
            let count = recent.iter().filter(|p| *p == candidate).count();
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((*candidate, count));
            }
        }
        best.map(|(emotion, _)| emotion)
    }

    pub fn guidance(&self) -> MoodGuidance {
        let trend = self.trend();
        let (tone, approach) = match trend {
            Trend::EstablishingBaseline => (
                "curious and welcoming",
                "get to know what brought them here without rushing",
            ),
            Trend::Improving => (
                "warm and encouraging",
                "notice what has been helping and reinforce it",
            ),
            Trend::Declining => (
                "gentle and validating",
                "make room for what has been weighing on them before suggesting anything",
            ),
            Trend::Stable => (
                "steady and supportive",
                "follow their lead and deepen the conversation",
            ),
        };

        let overwhelmed = self.latest().map_or(false, |p| p.intensity >= 0.7)
            || self.dominant_emotion() == Some(PrimaryEmotion::Distressed);
        let caution = if overwhelmed {
            Some("keep the pace slow and the reply short; they may be overwhelmed")
        } else if trend == Trend::Declining {
            Some("avoid sounding upbeat or dismissive")
        } else {
            None
        };

        MoodGuidance { trend, tone, approach, caution }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn point(index: i64, valence: f64) -> MoodPoint {
        MoodPoint {
            timestamp: Utc.timestamp_opt(1_700_000_000 + index, 0).unwrap(),
            primary: PrimaryEmotion::Neutral,
            intensity: 0.3,
            secondary: Vec::new(),
            valence,
        }
    }

    #[test]
    fn test_twenty_first_point_evicts_oldest() {
        let mut series = MoodSeries::new();
        for i in 0..20 {
            assert!(series.push(point(i, 0.0)).is_none());
        }
        let evicted = series.push(point(20, 0.0)).expect("oldest point evicted");
        assert_eq!(evicted, point(0, 0.0));
        assert_eq!(series.len(), MOOD_SERIES_CAPACITY);
        assert_eq!(series.iter().next(), Some(&point(1, 0.0)));
        assert_eq!(series.latest(), Some(&point(20, 0.0)));
    }

    #[test]
    fn test_oversized_stored_series_keeps_newest() {
        let stored: Vec<MoodPoint> = (0..25).map(|i| point(i, 0.0)).collect();
        let json = serde_json::json!({ "points": stored });

        let series: MoodSeries = serde_json::from_value(json).unwrap();
        assert_eq!(series.len(), MOOD_SERIES_CAPACITY);
        assert_eq!(series.iter().next(), Some(&point(5, 0.0)));
        assert_eq!(series.latest(), Some(&point(24, 0.0)));
    }

    #[test]
    fn test_trend_and_guidance() {
        let mut series = MoodSeries::new();
        assert_eq!(series.guidance().trend, Trend::EstablishingBaseline);

        for (i, v) in [0.5, 0.4, 0.0, -0.5, -0.7].into_iter().enumerate() {
            series.push(point(i as i64, v));
        }
        let guidance = series.guidance();
        assert_eq!(guidance.trend, Trend::Declining);
        assert_eq!(guidance.tone, "gentle and validating");
        assert!(guidance.caution.is_some());
    }

    #[test]
    fn test_dominant_emotion_ignores_neutral() {
        let mut series = MoodSeries::new();
        let mut sad = point(0, -0.5);
        sad.primary = PrimaryEmotion::Specific(EmotionLabel::Sadness);
        series.push(sad.clone());
        series.push(point(1, 0.0));
        series.push(sad);
        assert_eq!(
            series.dominant_emotion(),
            Some(PrimaryEmotion::Specific(EmotionLabel::Sadness))
        );
    }

    proptest! {
        #[test]
        fn prop_series_never_exceeds_capacity(values in proptest::collection::vec(-1.0f64..1.0, 0..80)) {
            let mut series = MoodSeries::new();
            for (i, v) in values.iter().enumerate() {
                let before = series.len();
                let evicted = series.push(point(i as i64, *v));
                prop_assert!(series.len() <= MOOD_SERIES_CAPACITY);
                prop_assert_eq!(evicted.is_some(), before == MOOD_SERIES_CAPACITY);
            }
            let kept = values.len().min(MOOD_SERIES_CAPACITY);
            prop_assert_eq!(series.len(), kept);
        }
    }
}

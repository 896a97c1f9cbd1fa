//! Longitudinal clinical-state estimate for one session.
//!
//! Folds each turn's symptom signals into per-category tallies, derives a
//! coarse risk level and keeps a bounded mood series. Nothing in here reads
//! the clock: given the same ordered signal sets the state is identical.

pub mod mood;
pub mod render;

pub use mood::{MoodGuidance, MoodPoint, MoodSeries, MOOD_SERIES_CAPACITY};
pub use render::ClinicalContext;

use crate::lexicon::{SymptomCategory, MAX_CONTRIBUTION_PER_MESSAGE};
use crate::signals::SymptomSignal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Summed score at which risk becomes Moderate.
pub const MODERATE_THRESHOLD: f64 = 10.0;
/// Summed score at which risk becomes High.
pub const HIGH_THRESHOLD: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_score(total: f64) -> Self {
        if total >= HIGH_THRESHOLD {
            RiskLevel::High
        } else if total >= MODERATE_THRESHOLD {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTally {
    pub indicator_count: u32,
    pub score: f64,
}

/// Direct override of the computed risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskOverride {
    Crisis { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisOverride {
    pub reason: String,
    /// Value of `turns_observed` when the override was set.
    pub at_turn: u64,
}

/// Explicit human follow-up that is allowed to lift a crisis override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionEvent {
    pub performed_by: String,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

/// Screening-style estimates derived from indicator counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningEstimate {
    /// 0..=27, modelled on a nine-item depression questionnaire.
    pub depressive: u8,
    /// 0..=21, modelled on a seven-item anxiety questionnaire.
    pub anxious: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningBand {
    Minimal,
    Mild,
    Moderate,
    ModeratelySevere,
    Severe,
}

impl ScreeningEstimate {
    pub fn depressive_band(&self) -> ScreeningBand {
        match self.depressive {
            0..=4 => ScreeningBand::Minimal,
            5..=9 => ScreeningBand::Mild,
            10..=14 => ScreeningBand::Moderate,
            15..=19 => ScreeningBand::ModeratelySevere,
            _ => ScreeningBand::Severe,
        }
    }

    pub fn anxious_band(&self) -> ScreeningBand {
        match self.anxious {
            0..=4 => ScreeningBand::Minimal,
            5..=9 => ScreeningBand::Mild,
            10..=14 => ScreeningBand::Moderate,
            _ => ScreeningBand::Severe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalState {
    pub tallies: BTreeMap<SymptomCategory, CategoryTally>,
    pub risk: RiskLevel,
    pub crisis_override: Option<CrisisOverride>,
    pub turns_observed: u64,
    pub interventions: Vec<InterventionEvent>,
}

impl Default for ClinicalState {
    fn default() -> Self {
        Self {
            tallies: BTreeMap::new(),
            risk: RiskLevel::Low,
            crisis_override: None,
            turns_observed: 0,
            interventions: Vec::new(),
        }
    }
}

impl ClinicalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one turn's symptom signals into the running estimate.
    pub fn update(
        &mut self,
        symptoms: &[SymptomSignal],
        risk_override: Option<RiskOverride>,
    ) -> &ClinicalState {
        self.turns_observed += 1;

        for signal in symptoms {
            let tally = self.tallies.entry(signal.category).or_default();
            tally.indicator_count += 1;
            tally.score += signal.contribution.clamp(0.0, MAX_CONTRIBUTION_PER_MESSAGE);
        }

        if let Some(RiskOverride::Crisis { reason }) = risk_override {
            if self.crisis_override.is_none() {
                warn!("Crisis override set at turn {}: {}", self.turns_observed, reason);
                self.crisis_override = Some(CrisisOverride {
                    reason,
                    at_turn: self.turns_observed,
                });
            }
        }

        let previous = self.risk;
        self.recompute_risk();
        if self.risk != previous {
            info!("Risk level changed: {} -> {}", previous.as_str(), self.risk.as_str());
        } else {
            debug!("Risk level unchanged at {} (total score {:.1})", self.risk.as_str(), self.total_score());
        }
        self
    }

    /// The only way to lift a crisis override.
    pub fn resolve_crisis(&mut self, event: InterventionEvent) -> &ClinicalState {
        info!("Intervention recorded by {}; lifting crisis override", event.performed_by);
        self.crisis_override = None;
        self.interventions.push(event);
        self.recompute_risk();
        self
    }

    /// Rebuilds a state from the full ordered history of per-turn inputs.
    pub fn replay<I>(history: I) -> ClinicalState
    where
        I: IntoIterator<Item = (Vec<SymptomSignal>, Option<RiskOverride>)>,
    {
        let mut state = ClinicalState::new();
        for (symptoms, risk_override) in history {
            state.update(&symptoms, risk_override);
        }
        state
    }

    pub fn total_score(&self) -> f64 {
        self.tallies.values().map(|t| t.score).sum()
    }

    pub fn score_for(&self, category: SymptomCategory) -> f64 {
        self.tallies.get(&category).map(|t| t.score).unwrap_or(0.0)
    }

    pub fn is_crisis_locked(&self) -> bool {
        self.crisis_override.is_some()
    }

    pub fn screening(&self) -> ScreeningEstimate {
        let sum = |pred: fn(&SymptomCategory) -> bool, cap: u32| -> u8 {
            self.tallies
                .iter()
                .filter(|(c, _)| pred(c))
                .map(|(_, t)| t.indicator_count)
                .sum::<u32>()
                .min(cap) as u8
        };
        ScreeningEstimate {
            depressive: sum(SymptomCategory::is_depressive, 27),
            anxious: sum(SymptomCategory::is_anxious, 21),
        }
    }

    /// Categories ordered by descending score.
    pub fn ranked_categories(&self) -> Vec<(SymptomCategory, &CategoryTally)> {
        let mut ranked: Vec<_> = self.tallies.iter().map(|(c, t)| (*c, t)).collect();
        ranked.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));
        ranked
    }

    fn recompute_risk(&mut self) {
        self.risk = if self.crisis_override.is_some() {
            RiskLevel::High
        } else {
            RiskLevel::from_score(self.total_score())
        };
    }
}

//! Two-tier crisis lexicon scan.

use crate::lexicon::{CrisisKind, SELF_HARM_PHRASES, SOFT_CRISIS_PHRASES, VIOLENCE_PHRASES};
use crate::utils::TextUtils;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CrisisAssessment {
    /// High-risk phrase found: the turn must stop here.
    HighRisk { kind: CrisisKind, trigger: String },
    /// Soft phrases found: annotate and continue.
    SoftRisk { phrases: Vec<String> },
    Clear,
}

pub fn detect(safe_text: &str) -> CrisisAssessment {
    let folded = TextUtils::fold(safe_text);
    let words = TextUtils::word_set(&folded);
    let hit = |phrase: &str| TextUtils::matches_keyword(&folded, &words, phrase);

    if let Some(trigger) = SELF_HARM_PHRASES.iter().find(|p| hit(p)) {
        return CrisisAssessment::HighRisk {
            kind: CrisisKind::SelfHarm,
            trigger: trigger.to_string(),
        };
    }
    if let Some(trigger) = VIOLENCE_PHRASES.iter().find(|p| hit(p)) {
        return CrisisAssessment::HighRisk {
            kind: CrisisKind::Violence,
            trigger: trigger.to_string(),
        };
    }

    let soft: Vec<String> = SOFT_CRISIS_PHRASES
        .iter()
        .filter(|p| hit(p))
        .map(|p| p.to_string())
        .collect();
    if soft.is_empty() {
        CrisisAssessment::Clear
    } else {
        CrisisAssessment::SoftRisk { phrases: soft }
    }
}

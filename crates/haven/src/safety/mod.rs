//! Safety gate: sanitize, crisis-detect, moderate. Runs before any adaptive
//! logic; the first failing check short-circuits the rest. The output
//! scrubber lives here too since it is the matching gate on the way out.

pub mod crisis;
pub mod moderation;
pub mod sanitizer;
pub mod scrubber;

pub use crisis::CrisisAssessment;
pub use scrubber::{scrub, ScrubOutcome, ScrubViolation};

use crate::lexicon::{
    CrisisKind, ModerationCategory, EMERGENCY_RESPONSE, MODERATION_REFUSAL, VIOLENCE_RESPONSE,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Why the gate stopped a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockReason {
    Crisis { kind: CrisisKind, trigger: String },
    Moderation { category: ModerationCategory },
}

impl BlockReason {
    pub fn code(&self) -> &'static str {
        match self {
            BlockReason::Crisis { kind: CrisisKind::SelfHarm, .. } => "crisis_self_harm",
            BlockReason::Crisis { kind: CrisisKind::Violence, .. } => "crisis_violence",
            BlockReason::Moderation { .. } => "moderation",
        }
    }

    pub fn is_crisis(&self) -> bool {
        matches!(self, BlockReason::Crisis { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Pass {
        safe_text: String,
        /// Soft-tier crisis phrases present in the text.
        soft_flags: Vec<String>,
        sanitized: bool,
    },
    HardStop {
        reason: BlockReason,
        response: &'static str,
    },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SafetyGate;

impl SafetyGate {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, raw: &str) -> GateOutcome {
        let sanitized = sanitizer::sanitize(raw);

        // Sanitizing drops whole role-prefixed lines, so a high-risk phrase on
        // such a line is only visible in the raw text.
        let assessment = match crisis::detect(raw) {
            high @ CrisisAssessment::HighRisk { .. } => high,
            _ => crisis::detect(&sanitized.text),
        };

        let soft_flags = match assessment {
            CrisisAssessment::HighRisk { kind, trigger } => {
                warn!("Crisis phrase detected ({:?}); returning emergency response", kind);
                let response = match kind {
                    CrisisKind::SelfHarm => EMERGENCY_RESPONSE,
                    CrisisKind::Violence => VIOLENCE_RESPONSE,
                };
                return GateOutcome::HardStop {
                    reason: BlockReason::Crisis { kind, trigger },
                    response,
                };
            }
            CrisisAssessment::SoftRisk { phrases } => {
                info!("Soft risk phrases present: {:?}", phrases);
                phrases
            }
            CrisisAssessment::Clear => Vec::new(),
        };

        if let Some(category) = moderation::moderate(&sanitized.text) {
            warn!("Moderation blocklist match: {}", category.as_str());
            return GateOutcome::HardStop {
                reason: BlockReason::Moderation { category },
                response: MODERATION_REFUSAL,
            };
        }

        GateOutcome::Pass {
            safe_text: sanitized.text,
            soft_flags,
            sanitized: sanitized.stripped,
        }
    }
}

//! Final deterministic gate on synthesized drafts.

use crate::lexicon::SCRUB_FALLBACK;
use crate::tools::ToolKind;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fragments that only appear when a draft leaks prompt scaffolding.
const LEAK_MARKERS: &[&str] = &[
    "system:",
    "controller:",
    "tool output:",
    "tool results",
    "json:",
    "execution plan",
    "=== ",
    "[background",
    "you are a supportive",
    "ignore previous instructions",
    "risk level",
    "clinical state",
];

lazy_static! {
    static ref DIAGNOSTIC_CLAIM: Regex = Regex::new(
        r"(?i)\byou (have|are suffering from|are showing signs of|meet the criteria for) (clinical |major |severe )?(depression|anxiety disorder|ptsd|bipolar|ocd|an? (mental )?disorder)"
    )
    .unwrap();
    static ref SCREENING_SCORE: Regex =
        Regex::new(r"(?i)\b(phq-?9|gad-?7)\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrubViolation {
    EmptyDraft,
    LeakedInternals,
    DiagnosticClaim,
}

impl ScrubViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrubViolation::EmptyDraft => "empty_draft",
            ScrubViolation::LeakedInternals => "leaked_internals",
            ScrubViolation::DiagnosticClaim => "diagnostic_claim",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrubOutcome {
    Approved(String),
    Blocked { fallback: String, violation: ScrubViolation },
}

impl ScrubOutcome {
    /// Text to show the user regardless of outcome.
    pub fn text(&self) -> &str {
        match self {
            ScrubOutcome::Approved(text) => text,
            ScrubOutcome::Blocked { fallback, .. } => fallback,
        }
    }
}

pub fn scrub(draft: &str) -> ScrubOutcome {
    let trimmed = draft.trim();
    if trimmed.is_empty() {
        return blocked(ScrubViolation::EmptyDraft);
    }

    let lowered = trimmed.to_lowercase();
    let leaks_marker = LEAK_MARKERS.iter().any(|m| lowered.contains(m));
    let leaks_tool = ToolKind::ALL.iter().any(|kind| lowered.contains(kind.internal_name()));
    if leaks_marker || leaks_tool || SCREENING_SCORE.is_match(trimmed) {
        return blocked(ScrubViolation::LeakedInternals);
    }

    if DIAGNOSTIC_CLAIM.is_match(trimmed) {
        return blocked(ScrubViolation::DiagnosticClaim);
    }

    ScrubOutcome::Approved(trimmed.to_string())
}

fn blocked(violation: ScrubViolation) -> ScrubOutcome {
    tracing::warn!("Draft blocked by output scrubber: {}", violation.as_str());
    ScrubOutcome::Blocked {
        fallback: SCRUB_FALLBACK.to_string(),
        violation,
    }
}

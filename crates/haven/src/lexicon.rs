//! Static keyword and phrase tables.
//!
//! Pure data: category enums, the words that indicate them, severity
//! modifiers, crisis tiers and the moderation blocklist. Matching lives in
//! [`crate::utils::TextUtils`] and the extractors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Symptom categories tracked longitudinally by the clinical state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomCategory {
    DepressedMood,
    Anxiety,
    Sleep,
    Appetite,
    Concentration,
    Energy,
    Irritability,
    SelfHarmIdeation,
}

impl SymptomCategory {
    pub const ALL: [SymptomCategory; 8] = [
        SymptomCategory::DepressedMood,
        SymptomCategory::Anxiety,
        SymptomCategory::Sleep,
        SymptomCategory::Appetite,
        SymptomCategory::Concentration,
        SymptomCategory::Energy,
        SymptomCategory::Irritability,
        SymptomCategory::SelfHarmIdeation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymptomCategory::DepressedMood => "depressed_mood",
            SymptomCategory::Anxiety => "anxiety",
            SymptomCategory::Sleep => "sleep",
            SymptomCategory::Appetite => "appetite",
            SymptomCategory::Concentration => "concentration",
            SymptomCategory::Energy => "energy",
            SymptomCategory::Irritability => "irritability",
            SymptomCategory::SelfHarmIdeation => "self_harm_ideation",
        }
    }

    /// Everyday wording safe to put in front of the generation model.
    pub fn plain_theme(&self) -> &'static str {
        match self {
            SymptomCategory::DepressedMood => "feeling low",
            SymptomCategory::Anxiety => "worry and tension",
            SymptomCategory::Sleep => "trouble resting",
            SymptomCategory::Appetite => "changes in eating",
            SymptomCategory::Concentration => "difficulty focusing",
            SymptomCategory::Energy => "feeling drained",
            SymptomCategory::Irritability => "feeling on edge with others",
            SymptomCategory::SelfHarmIdeation => "wanting to withdraw from everything",
        }
    }

    /// Score added per message in which the category is matched, before
    /// severity modifiers.
    pub fn base_weight(&self) -> f64 {
        match self {
            SymptomCategory::DepressedMood | SymptomCategory::Anxiety => 2.0,
            SymptomCategory::SelfHarmIdeation => 3.0,
            _ => 1.0,
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            SymptomCategory::DepressedMood => &[
                "sad", "down", "depressed", "hopeless", "worthless", "empty", "numb", "miserable",
            ],
            SymptomCategory::Anxiety => &[
                "anxious", "worried", "nervous", "panic", "fear", "scared", "tense", "on edge",
            ],
            SymptomCategory::Sleep => &[
                "sleep", "insomnia", "tired", "exhausted", "fatigue", "rest", "can't sleep",
                "nightmares",
            ],
            SymptomCategory::Appetite => &[
                "appetite", "eating", "food", "hungry", "weight", "not eating",
            ],
            SymptomCategory::Concentration => &[
                "focus", "concentrate", "attention", "distracted", "forgetful", "can't think",
            ],
            SymptomCategory::Energy => &[
                "energy", "motivation", "tired", "exhausted", "fatigue", "drained", "sluggish",
            ],
            SymptomCategory::Irritability => &[
                "irritable", "angry", "annoyed", "frustrated", "snapping", "short-tempered",
            ],
            SymptomCategory::SelfHarmIdeation => &[
                "disappear", "not be here", "no reason to live", "wish i wasn't here",
            ],
        }
    }

    /// Categories that feed the depressive screening estimate.
    pub fn is_depressive(&self) -> bool {
        matches!(
            self,
            SymptomCategory::DepressedMood
                | SymptomCategory::Sleep
                | SymptomCategory::Appetite
                | SymptomCategory::Concentration
                | SymptomCategory::Energy
                | SymptomCategory::SelfHarmIdeation
        )
    }

    /// Categories that feed the anxiety screening estimate.
    pub fn is_anxious(&self) -> bool {
        matches!(
            self,
            SymptomCategory::Anxiety | SymptomCategory::Irritability | SymptomCategory::Sleep
        )
    }
}

impl fmt::Display for SymptomCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained emotion labels detected in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Hurt,
    Sadness,
    Betrayal,
    Anger,
    Shame,
    Fear,
    Loneliness,
    Confusion,
    Grief,
    Hopelessness,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 10] = [
        EmotionLabel::Hurt,
        EmotionLabel::Sadness,
        EmotionLabel::Betrayal,
        EmotionLabel::Anger,
        EmotionLabel::Shame,
        EmotionLabel::Fear,
        EmotionLabel::Loneliness,
        EmotionLabel::Confusion,
        EmotionLabel::Grief,
        EmotionLabel::Hopelessness,
    ];

    /// Order used to pick a primary emotion when several are present.
    pub const SEVERITY_ORDER: [EmotionLabel; 9] = [
        EmotionLabel::Betrayal,
        EmotionLabel::Shame,
        EmotionLabel::Grief,
        EmotionLabel::Hurt,
        EmotionLabel::Loneliness,
        EmotionLabel::Sadness,
        EmotionLabel::Anger,
        EmotionLabel::Fear,
        EmotionLabel::Confusion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Hurt => "hurt",
            EmotionLabel::Sadness => "sadness",
            EmotionLabel::Betrayal => "betrayal",
            EmotionLabel::Anger => "anger",
            EmotionLabel::Shame => "shame",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Loneliness => "loneliness",
            EmotionLabel::Confusion => "confusion",
            EmotionLabel::Grief => "grief",
            EmotionLabel::Hopelessness => "hopelessness",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            EmotionLabel::Hurt => &["hurt", "wounded", "pain", "painful", "aching", "broken"],
            EmotionLabel::Sadness => &["sad", "unhappy", "down", "blue", "crying", "tears", "miserable"],
            EmotionLabel::Betrayal => &["betrayed", "cheated", "lied to", "backstabbed", "used me"],
            EmotionLabel::Anger => &["angry", "furious", "mad", "rage", "pissed", "resentful"],
            EmotionLabel::Shame => &["ashamed", "embarrassed", "humiliated", "stupid", "my fault"],
            EmotionLabel::Fear => &["afraid", "scared", "terrified", "anxious", "worried", "panic"],
            EmotionLabel::Loneliness => &["lonely", "alone", "isolated", "no one", "nobody", "abandoned"],
            EmotionLabel::Confusion => &["confused", "lost", "don't understand", "unsure", "mixed up"],
            EmotionLabel::Grief => &["grief", "grieving", "loss", "passed away", "died", "mourning"],
            EmotionLabel::Hopelessness => &["hopeless", "pointless", "no hope", "nothing matters", "why bother"],
        }
    }

    /// Extra negative weight an emotion carries into the sentiment score.
    pub fn negative_boost(&self) -> f64 {
        match self {
            EmotionLabel::Betrayal | EmotionLabel::Shame => 2.0,
            EmotionLabel::Hurt | EmotionLabel::Anger => 1.0,
            _ => 0.0,
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "happy", "better", "calm", "hopeful", "grateful", "relieved", "proud",
    "excited", "glad", "okay", "fine", "peaceful", "love", "enjoy", "thankful", "improving",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "bad", "awful", "terrible", "sad", "angry", "hurt", "worse", "hate", "upset", "anxious",
    "depressed", "lonely", "scared", "stressed", "overwhelmed", "miserable", "exhausted", "tired",
];

/// High-frequency intensifiers.
pub const INTENSIFIERS: &[&str] = &["very", "extremely", "always", "constantly", "severe", "severely"];

/// Phrases indicating a symptom persists over time.
pub const PERSISTENCE_PHRASES: &[&str] = &["every day", "all the time", "never stops", "for weeks", "for months"];

pub const SEVERITY_FACTOR: f64 = 1.5;
pub const MAX_SEVERITY_MULTIPLIER: f64 = 2.0;

/// Ceiling on what one message may add to a single category's score.
pub const MAX_CONTRIBUTION_PER_MESSAGE: f64 = 4.0;

/// Which kind of harm a high-tier crisis phrase refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisKind {
    SelfHarm,
    Violence,
}

pub const SELF_HARM_PHRASES: &[&str] = &[
    "suicide",
    "suicidal",
    "kill myself",
    "end my life",
    "harm myself",
    "hurt myself",
    "want to die",
    "self-harm",
    "self harm",
    "cutting myself",
    "overdose",
    "can't go on",
    "better off dead",
    "hang myself",
    "shoot myself",
    "jump off",
    "end it all",
];

pub const VIOLENCE_PHRASES: &[&str] = &[
    "kill them",
    "kill him",
    "kill her",
    "hurt them",
    "shoot them",
    "murder",
    "stab",
];

/// Soft-tier phrases annotate the turn without stopping it.
pub const SOFT_CRISIS_PHRASES: &[&str] = &[
    "hopeless",
    "no point",
    "give up",
    "cant go on",
    "why bother",
    "nothing matters",
];

/// Blocked content categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationCategory {
    Weapons,
    Poisoning,
    IllegalDrugs,
    SexualExploitation,
    Trafficking,
}

impl ModerationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationCategory::Weapons => "weapons",
            ModerationCategory::Poisoning => "poisoning",
            ModerationCategory::IllegalDrugs => "illegal_drugs",
            ModerationCategory::SexualExploitation => "sexual_exploitation",
            ModerationCategory::Trafficking => "trafficking",
        }
    }
}

pub const MODERATION_BLOCKLIST: &[(ModerationCategory, &[&str])] = &[
    (
        ModerationCategory::Weapons,
        &["how to build a bomb", "how to make a bomb", "make explosives", "build a gun"],
    ),
    (
        ModerationCategory::Poisoning,
        &["how to make poison", "poison someone", "undetectable poison"],
    ),
    (
        ModerationCategory::IllegalDrugs,
        &["illegal drugs", "buy cocaine", "cook meth", "sell drugs"],
    ),
    (
        ModerationCategory::SexualExploitation,
        &["child porn", "child sexual", "sexualize a minor"],
    ),
    (ModerationCategory::Trafficking, &["sex trafficking", "human trafficking"]),
];

/// Explicit requests for coping help.
pub const HELP_SEEKING_PHRASES: &[&str] = &[
    "help me", "what can i do", "what should i do", "cope", "coping", "manage", "feel better",
    "technique", "strategy", "relax", "calm down", "breathing", "mindfulness", "deal with",
    "any advice", "how do i",
];

/// Requests for professional or community support.
pub const RESOURCE_PHRASES: &[&str] = &[
    "therapist", "counselor", "counsellor", "psychiatrist", "find help", "professional",
    "support group", "treatment", "medication", "doctor", "insurance", "hotline",
];

/// References back to earlier conversation.
pub const MEMORY_REFERENCE_PHRASES: &[&str] = &[
    "remember", "last time", "we talked", "i told you", "i mentioned", "earlier",
    "before", "you said",
];

/// Requests to keep something in mind for later turns.
pub const MEMORY_WRITE_PHRASES: &[&str] = &[
    "remember that", "don't forget", "keep in mind", "note that", "please remember",
];

/// Recurring conversation topics tracked by the pattern extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Sleep,
    WorkStress,
    Relationships,
    SelfWorth,
    Worry,
    LowMood,
    Coping,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::Sleep,
        Topic::WorkStress,
        Topic::Relationships,
        Topic::SelfWorth,
        Topic::Worry,
        Topic::LowMood,
        Topic::Coping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Sleep => "sleep",
            Topic::WorkStress => "work stress",
            Topic::Relationships => "relationships",
            Topic::SelfWorth => "self-worth",
            Topic::Worry => "worry",
            Topic::LowMood => "low mood",
            Topic::Coping => "coping",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Topic::Sleep => &["sleep", "insomnia", "tired", "rest", "nightmares"],
            Topic::WorkStress => &["work", "job", "boss", "deadline", "career", "coworker"],
            Topic::Relationships => &["partner", "friend", "family", "relationship", "wife", "husband", "parents"],
            Topic::SelfWorth => &["worthless", "failure", "not good enough", "hate myself", "useless"],
            Topic::Worry => &["anxious", "worried", "nervous", "panic", "overthinking"],
            Topic::LowMood => &["sad", "depressed", "down", "empty", "numb"],
            Topic::Coping => &["cope", "coping", "manage", "handle", "deal with"],
        }
    }
}

/// Lines that try to take over the assistant's instructions.
pub const INJECTION_LINE_PATTERN: &str =
    r"(?im)^\s*(system|instruction|instructions|assistant|developer|ignore (all )?previous instructions)\s*:.*$";

/// Chat-template control tokens that must never reach a prompt.
pub const CONTROL_TOKEN_PATTERN: &str = r"(?i)<\|[a-z_]*\|>|\[/?inst\]|<</?sys>>";

/// Phrases that mean an instruction override even without a `Label:` prefix.
pub const OVERRIDE_PHRASE_PATTERN: &str =
    r"(?i)(ignore|disregard|forget) (all |any )?(previous|prior|above) (instructions|prompts|rules)";

pub const EMERGENCY_RESPONSE: &str = "I'm really concerned about what you've shared, and your safety matters most right now. \
Please reach out for immediate support: call or text 988 (Suicide & Crisis Lifeline, US), \
text HOME to 741741 (Crisis Text Line), or call your local emergency number. \
If you are in immediate danger, please contact emergency services now. You don't have to go through this alone.";

pub const VIOLENCE_RESPONSE: &str = "I'm concerned about what you've described. If anyone is in immediate danger, \
please contact your local emergency services right away. If you're feeling overwhelmed by anger or urges to hurt someone, \
you can call or text 988 to talk with a trained counselor right now.";

pub const MODERATION_REFUSAL: &str =
    "I can't help with that request. If there's something on your mind that you'd like to talk through, I'm here to listen.";

pub const SCRUB_FALLBACK: &str =
    "I'm sorry, I wasn't able to put together a good response just now. Could you tell me a bit more about what's on your mind?";

pub const GENERATION_APOLOGY: &str =
    "I'm sorry, I'm having trouble responding right now. I'm still here, and I'd like to hear more whenever you're ready.";

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_every_category_has_keywords() {
        for category in SymptomCategory::ALL {
            assert!(!category.keywords().is_empty(), "{} has no keywords", category);
            assert!(category.base_weight() > 0.0);
            assert!(category.base_weight() <= MAX_CONTRIBUTION_PER_MESSAGE);
        }
        for emotion in EmotionLabel::ALL {
            assert!(!emotion.keywords().is_empty(), "{} has no keywords", emotion);
        }
    }

    #[test]
    fn test_keywords_are_lowercase() {
        let all = SymptomCategory::ALL
            .iter()
            .flat_map(|c| c.keywords().iter())
            .chain(EmotionLabel::ALL.iter().flat_map(|e| e.keywords().iter()))
            .chain(SELF_HARM_PHRASES.iter())
            .chain(SOFT_CRISIS_PHRASES.iter());
        for keyword in all {
            assert_eq!(*keyword, keyword.to_lowercase());
        }
    }

    #[test]
    fn test_severity_order_excludes_hopelessness() {
        assert!(!EmotionLabel::SEVERITY_ORDER.contains(&EmotionLabel::Hopelessness));
        assert_eq!(EmotionLabel::SEVERITY_ORDER.len(), EmotionLabel::ALL.len() - 1);
    }

    #[test]
    fn test_patterns_compile() {
        assert!(Regex::new(INJECTION_LINE_PATTERN).is_ok());
        assert!(Regex::new(CONTROL_TOKEN_PATTERN).is_ok());
        assert!(Regex::new(OVERRIDE_PHRASE_PATTERN).is_ok());
    }

    #[test]
    fn test_emergency_response_lists_resources() {
        assert!(EMERGENCY_RESPONSE.contains("988"));
        assert!(EMERGENCY_RESPONSE.contains("741741"));
    }
}

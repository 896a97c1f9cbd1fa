use crate::lexicon::{ModerationCategory, MODERATION_BLOCKLIST};
use crate::utils::TextUtils;

/// First blocklisted category found in the text, if any.
pub fn moderate(safe_text: &str) -> Option<ModerationCategory> {
    let folded = TextUtils::fold(safe_text);
    MODERATION_BLOCKLIST
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| folded.contains(p)))
        .map(|(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocklisted_request() {
        assert_eq!(moderate("Tell me how to build a bomb"), Some(ModerationCategory::Weapons));
        assert_eq!(moderate("where can I find illegal drugs"), Some(ModerationCategory::IllegalDrugs));
    }

    #[test]
    fn test_ordinary_text_passes() {
        assert_eq!(moderate("My medication makes me drowsy"), None);
    }
}

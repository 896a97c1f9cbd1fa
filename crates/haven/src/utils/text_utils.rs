//! Text normalization and keyword matching shared by the gate, extractors and memory.

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s{2,}|[^\S ]").unwrap();
    static ref WORD_REGEX: Regex = Regex::new(r"[a-z0-9']+").unwrap();
}

pub struct TextUtils;

impl TextUtils {
    /// Collapse runs of whitespace into single spaces and trim the ends.
    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        let trimmed = text.trim();
        match WHITESPACE_REGEX.replace_all(trimmed, " ") {
            Cow::Borrowed(_) if trimmed.len() == text.len() => Cow::Borrowed(text),
            collapsed => Cow::Owned(collapsed.into_owned()),
        }
    }

    /// Lowercase form used for every lexicon lookup. Typographic apostrophes
    /// are folded to ASCII so "can’t" and "can't" match the same phrase.
    pub fn fold(text: &str) -> String {
        text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
    }

    /// Distinct word tokens of already-folded text.
    pub fn word_set(folded: &str) -> HashSet<&str> {
        WORD_REGEX
            .find_iter(folded)
            .map(|m| m.as_str().trim_matches('\''))
            .filter(|w| !w.is_empty())
            .collect()
    }

    /// Single-word keywords match whole tokens, multi-word phrases match as
    /// substrings of the folded text.
    pub fn matches_keyword(folded: &str, words: &HashSet<&str>, keyword: &str) -> bool {
        if keyword.contains(' ') || keyword.contains('\'') || keyword.contains('-') {
            folded.contains(keyword)
        } else {
            words.contains(keyword)
        }
    }

    pub fn count_words(text: &str) -> usize {
        text.split_whitespace().count()
    }

    /// Truncate to at most `max_chars` characters, appending an ellipsis when cut.
    pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> Cow<'_, str> {
        if text.chars().count() <= max_chars {
            return Cow::Borrowed(text);
        }
        if max_chars <= 3 {
            return Cow::Borrowed("...");
        }
        let cut: String = text.chars().take(max_chars - 3).collect();
        Cow::Owned(format!("{}...", cut.trim_end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(TextUtils::normalize_whitespace("  a \n\t b  "), "a b");
        assert!(matches!(TextUtils::normalize_whitespace("already clean"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_fold_handles_curly_apostrophes() {
        assert_eq!(TextUtils::fold("I Can’t Go On"), "i can't go on");
    }

    #[test]
    fn test_single_words_match_on_token_boundaries() {
        let folded = TextUtils::fold("I need some interest in life");
        let words = TextUtils::word_set(&folded);
        assert!(!TextUtils::matches_keyword(&folded, &words, "rest"));
        assert!(TextUtils::matches_keyword(&folded, &words, "interest"));
    }

    #[test]
    fn test_phrases_match_as_substrings() {
        let folded = TextUtils::fold("It happens every day now");
        let words = TextUtils::word_set(&folded);
        assert!(TextUtils::matches_keyword(&folded, &words, "every day"));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        let text = "héllo wörld, this is long";
        let cut = TextUtils::truncate_with_ellipsis(text, 8);
        assert!(cut.ends_with("..."));
        assert!(cut.chars().count() <= 8);
        assert_eq!(TextUtils::truncate_with_ellipsis("short", 10), "short");
    }
}

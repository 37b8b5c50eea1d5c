use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
}

/// Tokenize text into (token, position) using NFKC normalization and lowercasing.
/// Punctuation and whitespace only separate tokens; nothing is stemmed or dropped.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    WORD.find_iter(&normalized)
        .enumerate()
        .map(|(pos, m)| (m.as_str().to_string(), pos))
        .collect()
}

/// Tokens of `text` joined by single spaces.
pub fn normalize(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .map(|(t, _)| t)
        .collect::<Vec<_>>()
        .join(" ")
}

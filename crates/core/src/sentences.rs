//! Keyword-driven sentence selection for risk and driver commentary.
//!
//! Sentence boundaries are a heuristic: whitespace that follows `.` or `?`,
//! except after initials such as `e.g.` (`\w.\w.`) or short capitalised
//! abbreviations such as `Mr.` (`[A-Z][a-z].`). It is not a grammar-correct
//! splitter.

pub const MAX_SENTENCES: usize = 10;
pub const MIN_SENTENCE_CHARS: usize = 21;

/// Keywords the report engine uses to surface risks and drivers.
pub const RISK_KEYWORDS: [&str; 4] = ["risk", "growth", "decline", "guidance"];

/// Splits `text` into heuristic sentences. Newlines are treated as spaces and
/// the boundary whitespace character is consumed. Pieces are not trimmed.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    for idx in 0..chars.len() {
        if chars[idx].is_whitespace() && is_boundary(&chars, idx) {
            sentences.push(chars[start..idx].iter().collect());
            start = idx + 1;
        }
    }
    sentences.push(chars[start..].iter().collect());
    sentences
}

fn is_boundary(chars: &[char], idx: usize) -> bool {
    if idx == 0 || !matches!(chars[idx - 1], '.' | '?') {
        return false;
    }
    if idx >= 4 && is_word(chars[idx - 4]) && chars[idx - 3] == '.' && is_word(chars[idx - 2]) {
        return false;
    }
    if idx >= 3
        && chars[idx - 3].is_uppercase()
        && chars[idx - 2].is_lowercase()
        && chars[idx - 1] == '.'
    {
        return false;
    }
    true
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Returns up to [`MAX_SENTENCES`] sentences, in document order, that contain
/// any keyword as a case-insensitive substring and are at least
/// [`MIN_SENTENCE_CHARS`] characters long before trimming.
pub fn select_sentences<S: AsRef<str>>(text: &str, keywords: &[S]) -> Vec<String> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.as_ref().to_lowercase())
        .collect();
    split_sentences(text)
        .into_iter()
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .filter(|sentence| sentence.chars().count() >= MIN_SENTENCE_CHARS)
        .map(|sentence| sentence.trim().to_string())
        .take(MAX_SENTENCES)
        .collect()
}

//! Phrase segmentation and normalization.
//!
//! Commentary arrives either as sentences ("Goal Winston! Save Tommy.") or as
//! a comma-separated stream ("pass Logan, save Tommy"). Sentences are tried
//! first; when the text holds at most one sentence the commas are used instead.

/// Split `text` into trimmed, non-empty phrases borrowed from the original.
///
/// Sentence breaks are runs of `.`, `!` or `?` in the original text. If that
/// yields at most one phrase the original text is split on commas instead.
/// Non-blank text made only of break characters is kept as a single phrase.
pub fn segment_phrases(text: &str) -> Vec<&str> {
    let sentences = split_trimmed(text, is_sentence_break);
    if sentences.len() > 1 {
        return sentences;
    }

    let phrases = split_trimmed(text, |c| c == ',');
    if phrases.is_empty() && !text.trim().is_empty() {
        return vec![text.trim()];
    }
    phrases
}

fn is_sentence_break(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Characters that end a phrase. A vocabulary word containing one is split
/// apart before it can be matched.
pub fn is_phrase_break(c: char) -> bool {
    is_sentence_break(c) || c == ','
}

fn split_trimmed(text: &str, is_break: impl Fn(char) -> bool) -> Vec<&str> {
    text.split(is_break)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Replace every character that is neither alphanumeric nor whitespace with a
/// single space. The result has exactly as many characters as the input.
pub fn normalize(phrase: &str) -> String {
    phrase
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect()
}

/// Character offset of a byte index into `text`.
pub fn char_offset(text: &str, byte_index: usize) -> usize {
    text[..byte_index].chars().count()
}

//! Small text helpers shared by the editorial assessors and the transcript
//! assembly pass.

/// Splits text into trimmed sentences on `.`, `!` and `?` boundaries.
///
/// Good enough for duplicate detection over generated prose; not a general
/// sentence segmenter.
pub fn sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Normalizes a sentence for comparison: lowercase, alphanumeric words only,
/// single spaces.
pub fn normalize_sentence(sentence: &str) -> String {
    sentence
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Counts whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Fraction of `a`'s normalized sentences that also appear in `b`.
///
/// Returns 0.0 when `a` has no sentences.
pub fn sentence_overlap(a: &str, b: &str) -> f64 {
    let a_sentences: Vec<String> = sentences(a).iter().map(|s| normalize_sentence(s)).collect();
    if a_sentences.is_empty() {
        return 0.0;
    }

    let b_set: std::collections::HashSet<String> =
        sentences(b).iter().map(|s| normalize_sentence(s)).collect();

    let shared = a_sentences.iter().filter(|s| b_set.contains(*s)).count();
    shared as f64 / a_sentences.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentences_split_and_trim() {
        let s = sentences("First point. Second point!  Third?");
        assert_eq!(s, vec!["First point.", "Second point!", "Third?"]);
    }

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_sentence("The Borrow-Checker, explained."),
            "the borrowchecker explained"
        );
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("one two  three"), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_overlap_identical_text() {
        let text = "Ownership moves values. Borrowing lends them.";
        assert!((sentence_overlap(text, text) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overlap_disjoint_text() {
        let overlap = sentence_overlap("Ownership moves values.", "Generics are type parameters.");
        assert!(overlap.abs() < f64::EPSILON);
    }

    #[test]
    fn test_overlap_partial() {
        let a = "Ownership moves values. Generics are type parameters.";
        let b = "Ownership moves values. Traits define behavior.";
        let overlap = sentence_overlap(a, b);
        assert!((overlap - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overlap_empty_input() {
        assert_eq!(sentence_overlap("", "anything"), 0.0);
    }
}

//! Cognitive-mirroring (repetition) detection.
//!
//! Two checks: a self-duplication scan within one response, and a
//! normalized edit-distance comparison against the bounded history of
//! previously admitted responses.

use std::collections::VecDeque;

use serde::Serialize;

/// Responses retained for history comparison.
pub const MAX_HISTORY: usize = 5;

/// Normalized similarity at or above this flags a violation.
pub const SIMILARITY_THRESHOLD: f64 = 0.90;

/// Texts shorter than this are never checked (and never compared against).
pub const MIN_LENGTH: usize = 20;

/// Leading-fragment window for the self-duplication scan.
const LEAD_FRAGMENT: usize = 50;

/// A detected repetition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Repetition {
    /// The second half of the text contains a leading fragment of its own
    /// first half.
    Internal,
    /// The text is near-identical to a previously admitted response.
    HistoryMatch { similarity: f64 },
}

impl Repetition {
    /// Short statement of what was detected.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Internal => "Internal repetition detected",
            Self::HistoryMatch { .. } => "Response too similar to previous interaction",
        }
    }

    /// Similarity rendered for enforcement messages.
    pub fn similarity_label(&self) -> String {
        match self {
            Self::Internal => "exact match".to_string(),
            Self::HistoryMatch { similarity } => format!("{similarity:.2}"),
        }
    }
}

/// Bounded FIFO of previously admitted response texts.
#[derive(Debug, Default)]
pub struct ResponseHistory {
    entries: VecDeque<String>,
}

impl ResponseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a response, evicting the oldest entry at capacity.
    pub fn admit(&mut self, text: &str) {
        if self.entries.len() >= MAX_HISTORY {
            self.entries.pop_front();
        }
        self.entries.push_back(text.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }
}

/// Run both repetition checks against `input`. Does not mutate history;
/// admission is the caller's decision after a clean result.
pub fn detect_repetition(input: &str, history: &ResponseHistory) -> Option<Repetition> {
    let bytes = input.as_bytes();
    if bytes.len() < MIN_LENGTH {
        return None;
    }

    let half = bytes.len() / 2;
    if half > MIN_LENGTH {
        let lead_len = half.min(LEAD_FRAGMENT);
        let lead = &bytes[..lead_len];
        let second = &bytes[half..];
        if second.windows(lead_len).any(|w| w == lead) {
            return Some(Repetition::Internal);
        }
    }

    for past in history.iter() {
        if past.len() < MIN_LENGTH {
            continue;
        }
        let similarity = levenshtein_similarity(past, input);
        if similarity >= SIMILARITY_THRESHOLD {
            return Some(Repetition::HistoryMatch { similarity });
        }
    }

    None
}

/// Normalized similarity: `1 - levenshtein(a, b) / max(len(a), len(b))`.
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    1.0 - prev[b.len()] as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(levenshtein_similarity("", ""), 1.0);
        assert_eq!(levenshtein_similarity("abc", "abc"), 1.0);
        assert_eq!(levenshtein_similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_similarity_single_edit() {
        // One substitution over ten characters.
        let sim = levenshtein_similarity("abcdefghij", "abcdefghiX");
        assert!((sim - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_short_input_is_never_flagged() {
        let mut history = ResponseHistory::new();
        history.admit("short");
        assert_eq!(detect_repetition("short", &history), None);
    }

    #[test]
    fn test_internal_repetition() {
        let phrase = "The answer to your question is clear and simple. ";
        let doubled = format!("{phrase}{phrase}");
        let history = ResponseHistory::new();
        assert_eq!(
            detect_repetition(&doubled, &history),
            Some(Repetition::Internal)
        );
    }

    #[test]
    fn test_history_match() {
        let mut history = ResponseHistory::new();
        let text = "Let me explain exactly how the memory quota works here.";
        history.admit(text);

        match detect_repetition(text, &history) {
            Some(Repetition::HistoryMatch { similarity }) => {
                assert!((similarity - 1.0).abs() < 1e-9);
            }
            other => panic!("expected history match, got {other:?}"),
        }
    }

    #[test]
    fn test_distinct_text_passes() {
        let mut history = ResponseHistory::new();
        history.admit("A completely different earlier reply about weather patterns.");
        assert_eq!(
            detect_repetition(
                "Here is a brand new explanation of the quota arithmetic.",
                &history
            ),
            None
        );
    }

    #[test]
    fn test_history_eviction_is_fifo() {
        let mut history = ResponseHistory::new();
        for i in 0..7 {
            history.admit(&format!("response number {i} with enough length to matter"));
        }
        assert_eq!(history.len(), MAX_HISTORY);
        let first = history.iter().next().unwrap();
        assert!(first.contains("number 2"));
    }

    #[test]
    fn test_short_history_entries_are_skipped() {
        let mut history = ResponseHistory::new();
        history.admit("tiny");
        assert_eq!(
            detect_repetition("tiny but this one is long enough to be checked", &history),
            None
        );
    }
}

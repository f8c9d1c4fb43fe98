//! Mention spaces
//!
//! A mention space enumerates the spans of a document that a matcher gets
//! to look at. Spans never cross sentence boundaries.

use relx_core::{Document, Span};

/// Enumerates candidate spans of a document
pub trait MentionSpace: Send + Sync {
    /// Spans of `document`, grouped by sentence, longest first within a sentence
    fn spans(&self, document: &Document) -> Vec<Span>;
}

/// All n-grams of `n_min..=n_max` words within each sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ngrams {
    pub n_min: usize,
    pub n_max: usize,
}

impl Ngrams {
    pub fn new(n_max: usize) -> Self {
        Self {
            n_min: 1,
            n_max: n_max.max(1),
        }
    }

    pub fn with_min(mut self, n_min: usize) -> Self {
        self.n_min = n_min.clamp(1, self.n_max);
        self
    }
}

impl Default for Ngrams {
    fn default() -> Self {
        Self::new(5)
    }
}

impl MentionSpace for Ngrams {
    fn spans(&self, document: &Document) -> Vec<Span> {
        let mut spans = Vec::new();

        for sentence in &document.sentences {
            let words = sentence.len();
            for n in (self.n_min..=self.n_max.min(words)).rev() {
                for start in 0..=(words - n) {
                    if let Some(span) = sentence.span(start, start + n) {
                        spans.push(span);
                    }
                }
            }
        }

        spans
    }
}

/// Each whole sentence as a single span
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SentenceSpace;

impl MentionSpace for SentenceSpace {
    fn spans(&self, document: &Document) -> Vec<Span> {
        document
            .sentences
            .iter()
            .filter_map(|sentence| sentence.span(0, sentence.len()))
            .collect()
    }
}

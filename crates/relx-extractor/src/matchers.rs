//! Span matchers
//!
//! A matcher is a predicate over a span and its sentence. Matchers compose
//! through [`Union`], [`Intersect`] and [`Inverse`]. With
//! `longest_match_only` (the default) a span is skipped once a longer span
//! containing it has been accepted.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use relx_core::{Document, RelxError, Result, Sentence, Span};

/// A predicate deciding whether a span is a mention
pub trait Matcher: Send + Sync {
    /// Check a single span
    fn is_match(&self, span: &Span, sentence: &Sentence) -> bool;

    /// Drop spans nested within an already accepted span
    fn longest_match_only(&self) -> bool {
        true
    }

    /// Filter the spans of `document`, keeping the ones that match
    ///
    /// Spans are expected longest first within a sentence, as every
    /// [`MentionSpace`](crate::MentionSpace) yields them.
    fn apply(&self, document: &Document, spans: Vec<Span>) -> Vec<Span> {
        let mut accepted: Vec<Span> = Vec::new();

        for span in spans {
            let Some(sentence) = document.sentence(span.sentence) else {
                continue;
            };
            if self.longest_match_only() && accepted.iter().any(|a| a.contains(&span)) {
                continue;
            }
            if self.is_match(&span, sentence) {
                accepted.push(span);
            }
        }

        accepted
    }
}

// ============================================================================
// Regex
// ============================================================================

/// Matches span text against a regular expression
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    full_match: bool,
    longest_match_only: bool,
}

impl RegexMatcher {
    /// Build a matcher requiring the whole span to match `pattern`
    pub fn new(pattern: &str) -> Result<Self> {
        Self::builder(pattern, true, false)
    }

    /// Build a matcher that accepts a match anywhere in the span
    pub fn search(pattern: &str) -> Result<Self> {
        Self::builder(pattern, false, false)
    }

    /// Build a matcher with explicit options
    pub fn builder(pattern: &str, full_match: bool, ignore_case: bool) -> Result<Self> {
        let source = if full_match {
            format!("^(?:{pattern})$")
        } else {
            pattern.to_string()
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| RelxError::SchemaError(format!("invalid pattern {pattern:?}: {e}")))?;

        Ok(Self {
            regex,
            full_match,
            longest_match_only: true,
        })
    }

    pub fn with_longest_match_only(mut self, enabled: bool) -> Self {
        self.longest_match_only = enabled;
        self
    }

    /// Whether the pattern must cover the whole span
    pub fn is_full_match(&self) -> bool {
        self.full_match
    }
}

impl Matcher for RegexMatcher {
    fn is_match(&self, span: &Span, _sentence: &Sentence) -> bool {
        self.regex.is_match(&span.text)
    }

    fn longest_match_only(&self) -> bool {
        self.longest_match_only
    }
}

// ============================================================================
// Dictionary
// ============================================================================

/// Matches spans whose words, joined by single spaces, are a dictionary term
#[derive(Debug, Clone)]
pub struct DictionaryMatcher {
    terms: HashSet<String>,
    ignore_case: bool,
    use_lemmas: bool,
    longest_match_only: bool,
}

impl DictionaryMatcher {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| normalize_term(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
            ignore_case: false,
            use_lemmas: false,
            longest_match_only: true,
        }
    }

    pub fn ignore_case(mut self, enabled: bool) -> Self {
        self.ignore_case = enabled;
        if enabled {
            self.terms = self.terms.iter().map(|t| t.to_lowercase()).collect();
        }
        self
    }

    /// Compare against lemmas instead of surface words
    pub fn use_lemmas(mut self, enabled: bool) -> Self {
        self.use_lemmas = enabled;
        self
    }

    pub fn with_longest_match_only(mut self, enabled: bool) -> Self {
        self.longest_match_only = enabled;
        self
    }

    /// Number of distinct terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

fn normalize_term(term: &str) -> String {
    term.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Matcher for DictionaryMatcher {
    fn is_match(&self, span: &Span, sentence: &Sentence) -> bool {
        let tokens = if self.use_lemmas {
            &sentence.lemmas
        } else {
            &sentence.words
        };
        let Some(words) = tokens.get(span.word_start..span.word_end) else {
            return false;
        };

        let joined = words.join(" ");
        if self.ignore_case {
            self.terms.contains(&joined.to_lowercase())
        } else {
            self.terms.contains(&joined)
        }
    }

    fn longest_match_only(&self) -> bool {
        self.longest_match_only
    }
}

// ============================================================================
// Lambda
// ============================================================================

type SpanPredicate = dyn Fn(&Span, &Sentence) -> bool + Send + Sync;

/// Matches spans with an arbitrary closure
#[derive(Clone)]
pub struct LambdaFunctionMatcher {
    func: Arc<SpanPredicate>,
    longest_match_only: bool,
}

impl LambdaFunctionMatcher {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Span, &Sentence) -> bool + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            longest_match_only: true,
        }
    }

    pub fn with_longest_match_only(mut self, enabled: bool) -> Self {
        self.longest_match_only = enabled;
        self
    }
}

impl fmt::Debug for LambdaFunctionMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaFunctionMatcher")
            .field("longest_match_only", &self.longest_match_only)
            .finish_non_exhaustive()
    }
}

impl Matcher for LambdaFunctionMatcher {
    fn is_match(&self, span: &Span, sentence: &Sentence) -> bool {
        (self.func)(span, sentence)
    }

    fn longest_match_only(&self) -> bool {
        self.longest_match_only
    }
}

// ============================================================================
// Combinators
// ============================================================================

/// Matches if any inner matcher matches
#[derive(Clone)]
pub struct Union {
    matchers: Vec<Arc<dyn Matcher>>,
    longest_match_only: bool,
}

impl Union {
    pub fn new(matchers: Vec<Arc<dyn Matcher>>) -> Self {
        Self {
            matchers,
            longest_match_only: true,
        }
    }

    pub fn with_longest_match_only(mut self, enabled: bool) -> Self {
        self.longest_match_only = enabled;
        self
    }
}

impl Matcher for Union {
    fn is_match(&self, span: &Span, sentence: &Sentence) -> bool {
        self.matchers.iter().any(|m| m.is_match(span, sentence))
    }

    fn longest_match_only(&self) -> bool {
        self.longest_match_only
    }
}

/// Matches if every inner matcher matches
#[derive(Clone)]
pub struct Intersect {
    matchers: Vec<Arc<dyn Matcher>>,
    longest_match_only: bool,
}

impl Intersect {
    pub fn new(matchers: Vec<Arc<dyn Matcher>>) -> Self {
        Self {
            matchers,
            longest_match_only: true,
        }
    }

    pub fn with_longest_match_only(mut self, enabled: bool) -> Self {
        self.longest_match_only = enabled;
        self
    }
}

impl Matcher for Intersect {
    fn is_match(&self, span: &Span, sentence: &Sentence) -> bool {
        !self.matchers.is_empty() && self.matchers.iter().all(|m| m.is_match(span, sentence))
    }

    fn longest_match_only(&self) -> bool {
        self.longest_match_only
    }
}

/// Matches if the inner matcher does not
#[derive(Clone)]
pub struct Inverse {
    matcher: Arc<dyn Matcher>,
    longest_match_only: bool,
}

impl Inverse {
    pub fn new(matcher: Arc<dyn Matcher>) -> Self {
        Self {
            matcher,
            longest_match_only: true,
        }
    }

    pub fn with_longest_match_only(mut self, enabled: bool) -> Self {
        self.longest_match_only = enabled;
        self
    }
}

impl Matcher for Inverse {
    fn is_match(&self, span: &Span, sentence: &Sentence) -> bool {
        !self.matcher.is_match(span, sentence)
    }

    fn longest_match_only(&self) -> bool {
        self.longest_match_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MentionSpace, Ngrams};
    use relx_parser::HtmlParser;
    use std::path::Path;

    fn doc(html: &str) -> Document {
        HtmlParser::default().parse("doc", Path::new("doc.html"), html)
    }

    fn matched(matcher: &dyn Matcher, html: &str) -> Vec<String> {
        let document = doc(html);
        let spans = Ngrams::new(3).spans(&document);
        matcher
            .apply(&document, spans)
            .into_iter()
            .map(|s| s.text)
            .collect()
    }

    #[test]
    fn test_regex_full_match() {
        let matcher = RegexMatcher::new(r"\d{4}").unwrap();
        let hits = matched(&matcher, "<p>Born in 1961 or 19612.</p>");
        assert_eq!(hits, vec!["1961"]);
    }

    #[test]
    fn test_regex_search_and_case() {
        let search = RegexMatcher::search("obama").unwrap();
        assert!(matched(&search, "<p>Barack Obama</p>").is_empty());

        let search = RegexMatcher::builder("obama", false, true).unwrap();
        // The longest containing span wins
        assert_eq!(matched(&search, "<p>Barack Obama</p>"), vec!["Barack Obama"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RegexMatcher::new("(unclosed").unwrap_err();
        assert!(matches!(err, RelxError::SchemaError(_)));
    }

    #[test]
    fn test_dictionary() {
        let matcher = DictionaryMatcher::new(["Barack Obama", "Honolulu"]);
        let hits = matched(&matcher, "<p>Barack Obama was born in Honolulu.</p>");
        assert_eq!(hits, vec!["Barack Obama", "Honolulu"]);

        let strict = DictionaryMatcher::new(["honolulu"]);
        assert!(matched(&strict, "<p>Honolulu</p>").is_empty());

        let relaxed = DictionaryMatcher::new(["honolulu"]).ignore_case(true);
        assert_eq!(matched(&relaxed, "<p>Honolulu</p>"), vec!["Honolulu"]);
    }

    #[test]
    fn test_longest_match_only() {
        let dict = DictionaryMatcher::new(["Barack Obama", "Obama"]);
        assert_eq!(matched(&dict, "<p>Barack Obama</p>"), vec!["Barack Obama"]);

        let all = dict.with_longest_match_only(false);
        assert_eq!(matched(&all, "<p>Barack Obama</p>"), vec!["Barack Obama", "Obama"]);
    }

    #[test]
    fn test_lambda() {
        let capitalized = LambdaFunctionMatcher::new(|span, _| {
            span.len() == 1 && span.text.chars().next().is_some_and(char::is_uppercase)
        });
        let hits = matched(&capitalized, "<p>Barack met the Senate</p>");
        assert_eq!(hits, vec!["Barack", "Senate"]);
    }

    #[test]
    fn test_combinators() {
        let place: Arc<dyn Matcher> = Arc::new(DictionaryMatcher::new(["Honolulu"]));
        let person: Arc<dyn Matcher> = Arc::new(DictionaryMatcher::new(["Obama"]));
        let html = "<p>Obama Honolulu Chicago</p>";

        let either = Union::new(vec![place.clone(), person.clone()]);
        assert_eq!(matched(&either, html), vec!["Obama", "Honolulu"]);

        let single: Arc<dyn Matcher> = Arc::new(RegexMatcher::new(r"\w+").unwrap());
        let not_place = Intersect::new(vec![single, Arc::new(Inverse::new(place))]);
        assert_eq!(matched(&not_place, html), vec!["Obama", "Chicago"]);

        assert!(matched(&Intersect::new(Vec::new()), html).is_empty());
    }
}

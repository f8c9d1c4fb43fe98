//! Extraction schema
//!
//! Mention classes pair a mention space with a matcher; candidate classes
//! name the mention class of each slot. A schema is either assembled in
//! code or loaded from a TOML file:
//!
//! ```toml
//! [[mention_classes]]
//! name = "Presidentname"
//! space = { kind = "ngrams", n_max = 3 }
//! matcher = { kind = "dictionary", terms = ["Barack Obama"] }
//!
//! [[mention_classes]]
//! name = "Placeofbirth"
//! space = { kind = "ngrams", n_max = 3 }
//! matcher = { kind = "regex", pattern = "[A-Z][a-z]+" }
//!
//! [[candidate_classes]]
//! name = "PresidentnamePlaceofbirth"
//! mentions = ["Presidentname", "Placeofbirth"]
//! throttle = { same_sentence = true }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use relx_core::{Mention, RelxError, Result};

use crate::matchers::{DictionaryMatcher, Intersect, Inverse, Matcher, RegexMatcher, Union};
use crate::space::{MentionSpace, Ngrams, SentenceSpace};

/// Veto over a candidate tuple; returning `false` drops the tuple
pub type Throttler = Arc<dyn Fn(&[Mention]) -> bool + Send + Sync>;

/// A named mention type
#[derive(Clone)]
pub struct MentionClass {
    pub name: String,
    pub space: Arc<dyn MentionSpace>,
    pub matcher: Arc<dyn Matcher>,
}

impl MentionClass {
    pub fn new(
        name: impl Into<String>,
        space: impl MentionSpace + 'static,
        matcher: impl Matcher + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            space: Arc::new(space),
            matcher: Arc::new(matcher),
        }
    }
}

impl fmt::Debug for MentionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MentionClass")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A named relation type over an ordered list of mention classes
#[derive(Clone)]
pub struct CandidateClass {
    pub name: String,
    /// Mention class of each slot
    pub mentions: Vec<String>,
    /// Allow the same span in two slots
    pub self_relations: bool,
    /// Allow overlapping spans in two slots
    pub nested_relations: bool,
    /// Keep both orderings when slots share a mention class
    pub symmetric_relations: bool,
    pub throttler: Option<Throttler>,
}

impl CandidateClass {
    pub fn new<I, S>(name: impl Into<String>, mentions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            mentions: mentions.into_iter().map(Into::into).collect(),
            self_relations: false,
            nested_relations: false,
            symmetric_relations: true,
            throttler: None,
        }
    }

    pub fn with_self_relations(mut self, enabled: bool) -> Self {
        self.self_relations = enabled;
        self
    }

    pub fn with_nested_relations(mut self, enabled: bool) -> Self {
        self.nested_relations = enabled;
        self
    }

    pub fn with_symmetric_relations(mut self, enabled: bool) -> Self {
        self.symmetric_relations = enabled;
        self
    }

    pub fn with_throttler<F>(mut self, throttler: F) -> Self
    where
        F: Fn(&[Mention]) -> bool + Send + Sync + 'static,
    {
        self.throttler = Some(Arc::new(throttler));
        self
    }

    /// Number of slots
    pub fn arity(&self) -> usize {
        self.mentions.len()
    }
}

impl fmt::Debug for CandidateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateClass")
            .field("name", &self.name)
            .field("mentions", &self.mentions)
            .field("self_relations", &self.self_relations)
            .field("nested_relations", &self.nested_relations)
            .field("symmetric_relations", &self.symmetric_relations)
            .field("throttled", &self.throttler.is_some())
            .finish()
    }
}

/// Mention classes and candidate classes used by the extractors
#[derive(Debug, Clone)]
pub struct ExtractionSchema {
    mention_classes: Vec<MentionClass>,
    candidate_classes: Vec<CandidateClass>,
}

impl ExtractionSchema {
    /// Build and validate a schema
    pub fn new(
        mention_classes: Vec<MentionClass>,
        candidate_classes: Vec<CandidateClass>,
    ) -> Result<Self> {
        let schema = Self {
            mention_classes,
            candidate_classes,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Parse a TOML schema
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: SchemaFile = toml::from_str(content)
            .map_err(|e| RelxError::SchemaError(format!("invalid schema: {e}")))?;
        file.build()
    }

    /// Load a TOML schema file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelxError::SchemaError(format!("cannot read schema {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.candidate_classes.is_empty() {
            return Err(RelxError::SchemaError(
                "schema defines no candidate classes".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for class in &self.mention_classes {
            if !names.insert(class.name.as_str()) {
                return Err(RelxError::SchemaError(format!(
                    "duplicate mention class {}",
                    class.name
                )));
            }
        }

        let mut candidate_names = HashSet::new();
        for class in &self.candidate_classes {
            if !candidate_names.insert(class.name.as_str()) {
                return Err(RelxError::SchemaError(format!(
                    "duplicate candidate class {}",
                    class.name
                )));
            }
            if class.mentions.is_empty() {
                return Err(RelxError::SchemaError(format!(
                    "candidate class {} has no slots",
                    class.name
                )));
            }
            if let Some(unknown) = class.mentions.iter().find(|m| !names.contains(m.as_str())) {
                return Err(RelxError::SchemaError(format!(
                    "candidate class {} refers to unknown mention class {unknown}",
                    class.name
                )));
            }
        }

        Ok(())
    }

    pub fn mention_classes(&self) -> &[MentionClass] {
        &self.mention_classes
    }

    pub fn candidate_classes(&self) -> &[CandidateClass] {
        &self.candidate_classes
    }

    pub fn mention_class(&self, name: &str) -> Option<&MentionClass> {
        self.mention_classes.iter().find(|c| c.name == name)
    }

    pub fn candidate_class(&self, name: &str) -> Option<&CandidateClass> {
        self.candidate_classes.iter().find(|c| c.name == name)
    }

    /// Position of a candidate class, which is also its matrix index
    pub fn candidate_class_index(&self, name: &str) -> Option<usize> {
        self.candidate_classes.iter().position(|c| c.name == name)
    }
}

// ============================================================================
// TOML representation
// ============================================================================

fn yes() -> bool {
    true
}

fn one() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    mention_classes: Vec<MentionClassDef>,
    #[serde(default)]
    candidate_classes: Vec<CandidateClassDef>,
}

#[derive(Debug, Deserialize)]
struct MentionClassDef {
    name: String,
    space: SpaceDef,
    matcher: MatcherDef,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum SpaceDef {
    Ngrams {
        n_max: usize,
        #[serde(default = "one")]
        n_min: usize,
    },
    Sentence,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum MatcherDef {
    Regex {
        pattern: String,
        #[serde(default = "yes")]
        full_match: bool,
        #[serde(default)]
        ignore_case: bool,
        #[serde(default = "yes")]
        longest_match_only: bool,
    },
    Dictionary {
        terms: Vec<String>,
        #[serde(default)]
        ignore_case: bool,
        #[serde(default)]
        use_lemmas: bool,
        #[serde(default = "yes")]
        longest_match_only: bool,
    },
    Union {
        matchers: Vec<MatcherDef>,
        #[serde(default = "yes")]
        longest_match_only: bool,
    },
    Intersect {
        matchers: Vec<MatcherDef>,
        #[serde(default = "yes")]
        longest_match_only: bool,
    },
    Inverse {
        matcher: Box<MatcherDef>,
        #[serde(default = "yes")]
        longest_match_only: bool,
    },
}

#[derive(Debug, Deserialize)]
struct CandidateClassDef {
    name: String,
    mentions: Vec<String>,
    #[serde(default)]
    self_relations: bool,
    #[serde(default)]
    nested_relations: bool,
    #[serde(default = "yes")]
    symmetric_relations: bool,
    #[serde(default)]
    throttle: Option<ThrottleDef>,
}

/// Declarative throttling rules
#[derive(Debug, Clone, Copy, Deserialize)]
struct ThrottleDef {
    /// All mentions must sit in one sentence
    #[serde(default)]
    same_sentence: bool,
    /// Maximum distance between the first and last sentence of the tuple
    #[serde(default)]
    max_sentence_distance: Option<usize>,
}

impl ThrottleDef {
    fn accepts(&self, mentions: &[Mention]) -> bool {
        let positions = mentions.iter().map(|m| m.span.sentence);
        let (Some(lo), Some(hi)) = (positions.clone().min(), positions.max()) else {
            return true;
        };
        if self.same_sentence && lo != hi {
            return false;
        }
        self.max_sentence_distance
            .map_or(true, |limit| hi - lo <= limit)
    }
}

impl SchemaFile {
    fn build(self) -> Result<ExtractionSchema> {
        let mention_classes = self
            .mention_classes
            .into_iter()
            .map(|def| {
                Ok(MentionClass {
                    name: def.name,
                    space: def.space.build(),
                    matcher: def.matcher.build()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let candidate_classes = self
            .candidate_classes
            .into_iter()
            .map(|def| {
                let mut class = CandidateClass::new(def.name, def.mentions)
                    .with_self_relations(def.self_relations)
                    .with_nested_relations(def.nested_relations)
                    .with_symmetric_relations(def.symmetric_relations);
                if let Some(rule) = def.throttle {
                    class = class.with_throttler(move |mentions| rule.accepts(mentions));
                }
                class
            })
            .collect();

        ExtractionSchema::new(mention_classes, candidate_classes)
    }
}

impl SpaceDef {
    fn build(&self) -> Arc<dyn MentionSpace> {
        match *self {
            Self::Ngrams { n_max, n_min } => Arc::new(Ngrams::new(n_max).with_min(n_min)),
            Self::Sentence => Arc::new(SentenceSpace),
        }
    }
}

impl MatcherDef {
    fn build(self) -> Result<Arc<dyn Matcher>> {
        let matcher: Arc<dyn Matcher> = match self {
            Self::Regex {
                pattern,
                full_match,
                ignore_case,
                longest_match_only,
            } => Arc::new(
                RegexMatcher::builder(&pattern, full_match, ignore_case)?
                    .with_longest_match_only(longest_match_only),
            ),
            Self::Dictionary {
                terms,
                ignore_case,
                use_lemmas,
                longest_match_only,
            } => Arc::new(
                DictionaryMatcher::new(terms)
                    .ignore_case(ignore_case)
                    .use_lemmas(use_lemmas)
                    .with_longest_match_only(longest_match_only),
            ),
            Self::Union {
                matchers,
                longest_match_only,
            } => Arc::new(
                Union::new(build_all(matchers)?).with_longest_match_only(longest_match_only),
            ),
            Self::Intersect {
                matchers,
                longest_match_only,
            } => Arc::new(
                Intersect::new(build_all(matchers)?).with_longest_match_only(longest_match_only),
            ),
            Self::Inverse {
                matcher,
                longest_match_only,
            } => Arc::new(Inverse::new(matcher.build()?).with_longest_match_only(longest_match_only)),
        };
        Ok(matcher)
    }
}

fn build_all(defs: Vec<MatcherDef>) -> Result<Vec<Arc<dyn Matcher>>> {
    defs.into_iter().map(MatcherDef::build).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relx_core::Span;

    const SCHEMA: &str = r#"
        [[mention_classes]]
        name = "Presidentname"
        space = { kind = "ngrams", n_max = 3 }
        matcher = { kind = "dictionary", terms = ["Barack Obama"], ignore_case = true }

        [[mention_classes]]
        name = "Placeofbirth"
        space = { kind = "ngrams", n_max = 2, n_min = 1 }

        [mention_classes.matcher]
        kind = "union"
        matchers = [
            { kind = "regex", pattern = "Honolulu" },
            { kind = "inverse", matcher = { kind = "regex", pattern = ".*" } },
        ]

        [[candidate_classes]]
        name = "PresidentnamePlaceofbirth"
        mentions = ["Presidentname", "Placeofbirth"]
        throttle = { same_sentence = true }
    "#;

    fn mention(sentence: usize) -> Mention {
        Mention::new(
            "X",
            "doc",
            Span {
                sentence,
                word_start: 0,
                word_end: 1,
                char_start: 0,
                char_end: 1,
                text: "x".to_string(),
            },
        )
    }

    #[test]
    fn test_parse_toml_schema() {
        let schema = ExtractionSchema::from_toml_str(SCHEMA).unwrap();

        assert_eq!(schema.mention_classes().len(), 2);
        let class = schema.candidate_class("PresidentnamePlaceofbirth").unwrap();
        assert_eq!(class.arity(), 2);
        assert!(class.symmetric_relations);
        assert!(!class.self_relations);
        assert_eq!(
            schema.candidate_class_index("PresidentnamePlaceofbirth"),
            Some(0)
        );

        let throttle = class.throttler.as_ref().unwrap();
        assert!(throttle(&[mention(1), mention(1)]));
        assert!(!throttle(&[mention(1), mention(2)]));
    }

    #[test]
    fn test_unknown_mention_class() {
        let err = ExtractionSchema::new(
            vec![MentionClass::new(
                "A",
                Ngrams::new(1),
                DictionaryMatcher::new(["a"]),
            )],
            vec![CandidateClass::new("R", ["A", "B"])],
        )
        .unwrap_err();

        assert!(err.to_string().contains("unknown mention class B"));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_classes() {
        assert!(ExtractionSchema::new(Vec::new(), Vec::new()).is_err());

        let a = MentionClass::new("A", Ngrams::new(1), DictionaryMatcher::new(["a"]));
        let err = ExtractionSchema::new(
            vec![a.clone(), a],
            vec![CandidateClass::new("R", ["A"])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate mention class"));
    }

    #[test]
    fn test_invalid_toml() {
        let err = ExtractionSchema::from_toml_str("[[mention_classes]]\nname = 1").unwrap_err();
        assert!(matches!(err, RelxError::SchemaError(_)));
    }

    #[test]
    fn test_sentence_distance_throttle() {
        let rule = ThrottleDef {
            same_sentence: false,
            max_sentence_distance: Some(1),
        };
        assert!(rule.accepts(&[mention(3), mention(4)]));
        assert!(!rule.accepts(&[mention(3), mention(5)]));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.toml");
        std::fs::write(&path, SCHEMA).unwrap();

        let schema = ExtractionSchema::from_file(&path).unwrap();
        assert!(schema.mention_class("Placeofbirth").is_some());

        assert!(ExtractionSchema::from_file(dir.path().join("missing.toml")).is_err());
    }
}

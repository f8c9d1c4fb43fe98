//! RELX Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the RELX system:
//! - Parsed document models (documents, sentences, spans)
//! - Extraction models (mentions, candidates, entity relations)
//! - Prediction labels
//! - Common error types
//! - Configuration management
//! - The shared corpus store

pub mod config;
pub mod store;
pub mod workers;

pub use config::{
    AppConfig, ConfigError, DeployConfig, DeployMode, LoggingConfig, ModelConfig, PipelineConfig,
    ServerConfig,
};
pub use store::{CorpusStore, MemoryStore, ParseFailureRecord};
pub use workers::worker_pool;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for RELX operations
#[derive(Error, Debug)]
pub enum RelxError {
    #[error("Document source not found: {path}: {reason}")]
    SourceNotFound { path: PathBuf, reason: String },

    #[error("Failed to parse document {document}: {reason}")]
    ParseFailure { document: String, reason: String },

    #[error("Too many parse failures: {failed} of {total} documents failed")]
    TooManyParseFailures { failed: usize, total: usize },

    #[error("Vocabulary mismatch: {0}")]
    VocabularyMismatch(String),

    #[error("Checkpoint mismatch: {0}")]
    CheckpointMismatch(String),

    #[error("Stage order violation: expected {expected}, found {found}")]
    StageOrderViolation { expected: String, found: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RelxError>;

// ============================================================================
// Document Models
// ============================================================================

/// Coordinates of a table cell inside a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    /// Table index within the document
    pub table: usize,
    /// Row index within the table
    pub row: usize,
    /// Column index within the row
    pub col: usize,
}

/// A sentence: the smallest structural unit carrying lingual annotations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// Position of the sentence within its document
    pub position: usize,

    /// Index of the structural block (paragraph, cell, list item) it came from
    pub paragraph: usize,

    /// Raw sentence text
    pub text: String,

    /// Tokenized words
    pub words: Vec<String>,

    /// Lowercased word lemmas, aligned with `words`
    pub lemmas: Vec<String>,

    /// Byte offset of each word within `text`, aligned with `words`
    pub char_offsets: Vec<usize>,

    /// Tag of the enclosing HTML element
    pub html_tag: String,

    /// `class` / `id` attributes of the enclosing element, as `name=value`
    pub html_attrs: Vec<String>,

    /// Table cell coordinates, if the sentence sits inside a table
    pub cell: Option<CellRef>,
}

impl Sentence {
    /// Number of words in the sentence
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if the sentence has no words
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Build a span covering words `[word_start, word_end)`
    pub fn span(&self, word_start: usize, word_end: usize) -> Option<Span> {
        if word_start >= word_end || word_end > self.words.len() {
            return None;
        }

        let char_start = self.char_offsets[word_start];
        let char_end = self.char_offsets[word_end - 1] + self.words[word_end - 1].len();

        Some(Span {
            sentence: self.position,
            word_start,
            word_end,
            char_start,
            char_end,
            text: self.text.get(char_start..char_end)?.to_string(),
        })
    }
}

/// A parsed HTML document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document name (source file stem)
    pub name: String,

    /// Path the document was read from
    pub source: PathBuf,

    /// Ordered sentences
    pub sentences: Vec<Sentence>,

    /// Parse timestamp
    pub parsed_at: DateTime<Utc>,
}

impl Document {
    /// Create an empty document
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            sentences: Vec::new(),
            parsed_at: Utc::now(),
        }
    }

    /// Add a sentence, assigning its position
    pub fn push_sentence(&mut self, mut sentence: Sentence) {
        sentence.position = self.sentences.len();
        self.sentences.push(sentence);
    }

    /// Look up a sentence by position
    pub fn sentence(&self, position: usize) -> Option<&Sentence> {
        self.sentences.get(position)
    }

    /// Sentences occupying the given table cell
    pub fn cell_sentences(&self, table: usize, row: usize, col: usize) -> Vec<&Sentence> {
        let target = CellRef { table, row, col };
        self.sentences
            .iter()
            .filter(|s| s.cell == Some(target))
            .collect()
    }

    /// Total word count
    pub fn word_count(&self) -> usize {
        self.sentences.iter().map(Sentence::len).sum()
    }
}

// ============================================================================
// Extraction Models
// ============================================================================

/// A contiguous word span inside one sentence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Sentence position within the document
    pub sentence: usize,
    /// First word (inclusive)
    pub word_start: usize,
    /// Last word (exclusive)
    pub word_end: usize,
    /// Byte offset of the span start within the sentence text
    pub char_start: usize,
    /// Byte offset of the span end within the sentence text
    pub char_end: usize,
    /// Raw span text
    pub text: String,
}

impl Span {
    /// Number of words covered
    pub fn len(&self) -> usize {
        self.word_end - self.word_start
    }

    /// Check if the span covers no words
    pub fn is_empty(&self) -> bool {
        self.word_end <= self.word_start
    }

    /// Check if `other` lies within this span
    pub fn contains(&self, other: &Span) -> bool {
        self.sentence == other.sentence
            && self.word_start <= other.word_start
            && other.word_end <= self.word_end
    }

    /// Check if the two spans share at least one word
    pub fn overlaps(&self, other: &Span) -> bool {
        self.sentence == other.sentence
            && self.word_start < other.word_end
            && other.word_start < self.word_end
    }

    /// Check if both spans cover exactly the same words
    pub fn same_extent(&self, other: &Span) -> bool {
        self.sentence == other.sentence
            && self.word_start == other.word_start
            && self.word_end == other.word_end
    }
}

/// Identity of a mention in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MentionKey {
    pub document: String,
    pub sentence: usize,
    pub word_start: usize,
    pub word_end: usize,
    pub class: String,
}

/// A typed reference to a span within one parsed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Mention class (as configured in the extraction schema)
    pub class: String,
    /// Owning document name
    pub document: String,
    /// Span boundaries and text
    pub span: Span,
}

impl Mention {
    /// Create a new mention
    pub fn new(class: impl Into<String>, document: impl Into<String>, span: Span) -> Self {
        Self {
            class: class.into(),
            document: document.into(),
            span,
        }
    }

    /// Store key of this mention
    pub fn key(&self) -> MentionKey {
        MentionKey {
            document: self.document.clone(),
            sentence: self.span.sentence,
            word_start: self.span.word_start,
            word_end: self.span.word_end,
            class: self.class.clone(),
        }
    }

    /// Raw text of the mention span
    pub fn text(&self) -> &str {
        &self.span.text
    }
}

/// Identity of a candidate in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateKey {
    pub split: u32,
    pub class: String,
    pub mentions: Vec<MentionKey>,
}

/// A tuple of mentions hypothesizing one relation instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Candidate class (as configured in the extraction schema)
    pub class: String,
    /// Partition label
    pub split: u32,
    mentions: Vec<Mention>,
}

impl Candidate {
    /// Create a candidate; all mentions must come from the same document
    pub fn new(class: impl Into<String>, split: u32, mentions: Vec<Mention>) -> Result<Self> {
        let class = class.into();
        let first = mentions.first().ok_or_else(|| {
            RelxError::SchemaError(format!("candidate of class {class} has no mentions"))
        })?;

        if let Some(stray) = mentions.iter().find(|m| m.document != first.document) {
            return Err(RelxError::SchemaError(format!(
                "candidate of class {class} mixes documents {} and {}",
                first.document, stray.document
            )));
        }

        Ok(Self {
            class,
            split,
            mentions,
        })
    }

    /// Mentions in slot order
    pub fn mentions(&self) -> &[Mention] {
        &self.mentions
    }

    /// Number of slots
    pub fn arity(&self) -> usize {
        self.mentions.len()
    }

    /// Owning document name
    pub fn document(&self) -> &str {
        // Non-empty by construction
        &self.mentions[0].document
    }

    /// Store key of this candidate
    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            split: self.split,
            class: self.class.clone(),
            mentions: self.mentions.iter().map(Mention::key).collect(),
        }
    }

    /// Map the candidate to its entity relation (ordered mention texts)
    pub fn entity_relation(&self) -> EntityRelation {
        EntityRelation(self.mentions.iter().map(|m| m.text().to_string()).collect())
    }
}

/// Sparse feature vector: feature key -> weight
pub type FeatureVector = BTreeMap<String, f32>;

// ============================================================================
// Prediction Types
// ============================================================================

/// Label assigned to a candidate by the discriminative model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Abstain = 0,
    False = 1,
    True = 2,
}

impl Label {
    /// Numeric label value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Convert a numeric label value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Abstain),
            1 => Some(Self::False),
            2 => Some(Self::True),
            _ => None,
        }
    }

    /// The other non-abstain label
    pub fn opposite(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Abstain => Self::Abstain,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abstain => write!(f, "ABSTAIN"),
            Self::False => write!(f, "FALSE"),
            Self::True => write!(f, "TRUE"),
        }
    }
}

impl std::str::FromStr for Label {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ABSTAIN" | "0" => Ok(Self::Abstain),
            "FALSE" | "1" => Ok(Self::False),
            "TRUE" | "2" => Ok(Self::True),
            _ => Err(ConfigError::InvalidValue {
                key: "positive_label".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Deduplication key: the ordered raw text spans of a candidate's mentions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRelation(pub Vec<String>);

impl EntityRelation {
    /// Number of spans
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Spans in slot order
    pub fn spans(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for EntityRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, span) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}'", span.replace('\'', "\\'"))?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

// ============================================================================
// Tests
// ============================================================================

//! RELX Parser - HTML document parsing
//!
//! Turns raw HTML sources into structured [`Document`]s:
//! - `preprocessor`: resolves a file or directory locator into a lazy,
//!   restartable sequence of raw document records
//! - `html`: structural parsing (blocks, tags, attributes, table cells)
//! - `lingual`: sentence splitting and tokenization
//! - `corpus`: the parallel corpus parser that writes into the store
//!
//! [`Document`]: relx_core::Document

use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod corpus;
pub mod html;
pub mod lingual;
pub mod preprocessor;

pub use corpus::{CorpusParser, ParseSummary};
pub use html::HtmlParser;
pub use lingual::LingualParser;
pub use preprocessor::{DocPreprocessor, HtmlDocPreprocessor, InMemoryPreprocessor};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while parsing a single document
#[derive(Error, Debug)]
pub enum ParserError {
    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content is not valid UTF-8
    #[error("Text encoding error: {0} is not valid UTF-8")]
    EncodingError(String),

    /// Document exceeds the configured size limit
    #[error("Document {document} is {size} bytes, limit is {limit}")]
    TooLarge {
        document: String,
        size: usize,
        limit: usize,
    },
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Raw Documents
// ============================================================================

/// A raw HTML record produced by a preprocessor
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Document name (file stem)
    pub name: String,

    /// Path the content was read from
    pub path: PathBuf,

    /// Raw bytes
    pub content: Vec<u8>,
}

impl RawDocument {
    /// Create a raw document
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            content,
        }
    }

    /// Document name derived from a path
    pub fn name_for(path: &Path) -> String {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string()
    }
}

/// Which annotation layers the corpus parser produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Record HTML tags, attributes and table coordinates
    pub structural: bool,

    /// Split blocks into sentences and tokenize with the lingual parser
    pub lingual: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            structural: true,
            lingual: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_for_path() {
        assert_eq!(RawDocument::name_for(Path::new("/data/obama.html")), "obama");
        assert_eq!(RawDocument::name_for(Path::new("plain")), "plain");
    }

    #[test]
    fn test_error_display() {
        let err = ParserError::TooLarge {
            document: "doc".to_string(),
            size: 10,
            limit: 5,
        };
        assert_eq!(err.to_string(), "Document doc is 10 bytes, limit is 5");
    }
}

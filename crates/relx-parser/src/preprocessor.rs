//! Document preprocessors
//!
//! A preprocessor resolves a source locator up front and then yields raw
//! document records lazily. Calling `documents()` again restarts the
//! sequence from the beginning.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use relx_core::RelxError;

use crate::{ParserError, RawDocument, Result};

/// A restartable source of raw documents
pub trait DocPreprocessor: Send + Sync {
    /// The locator this preprocessor was built from
    fn locator(&self) -> &Path;

    /// Lazily yield the raw records; each call starts over
    fn documents(&self) -> Box<dyn Iterator<Item = Result<RawDocument>> + Send + '_>;

    /// Number of records the sequence will yield
    fn len(&self) -> usize;

    /// Check if the sequence is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "html" | "htm"))
        .unwrap_or(false)
}

fn not_found(path: &Path, reason: impl ToString) -> RelxError {
    RelxError::SourceNotFound {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Fails when two paths map to the same document name
fn reject_name_collisions(paths: &[PathBuf]) -> relx_core::Result<()> {
    let mut seen: HashMap<String, &Path> = HashMap::new();
    for path in paths {
        let name = RawDocument::name_for(path);
        if let Some(first) = seen.insert(name.clone(), path) {
            return Err(RelxError::ParseFailure {
                document: name,
                reason: format!(
                    "{} and {} map to the same document name",
                    first.display(),
                    path.display()
                ),
            });
        }
    }
    Ok(())
}

/// Reads HTML documents from a file or a directory of `.html`/`.htm` files
#[derive(Debug, Clone)]
pub struct HtmlDocPreprocessor {
    locator: PathBuf,
    paths: Vec<PathBuf>,
}

impl HtmlDocPreprocessor {
    /// Resolve a locator; fails if it does not point at readable content
    pub fn new(locator: impl Into<PathBuf>) -> relx_core::Result<Self> {
        Self::with_max_docs(locator, None)
    }

    /// Resolve a locator, keeping at most `max_docs` documents
    pub fn with_max_docs(
        locator: impl Into<PathBuf>,
        max_docs: Option<usize>,
    ) -> relx_core::Result<Self> {
        let locator = locator.into();
        let metadata = fs::metadata(&locator).map_err(|e| not_found(&locator, e))?;

        let mut paths = if metadata.is_dir() {
            let entries = fs::read_dir(&locator).map_err(|e| not_found(&locator, e))?;
            let mut paths: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && is_html(path))
                .collect();
            paths.sort();

            if paths.is_empty() {
                return Err(not_found(&locator, "directory contains no .html or .htm files"));
            }
            paths
        } else {
            // Opening proves readability without reading the content yet
            fs::File::open(&locator).map_err(|e| not_found(&locator, e))?;
            vec![locator.clone()]
        };

        if let Some(max) = max_docs {
            paths.truncate(max);
        }
        reject_name_collisions(&paths)?;

        Ok(Self { locator, paths })
    }

    /// Paths that will be read, in order
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl DocPreprocessor for HtmlDocPreprocessor {
    fn locator(&self) -> &Path {
        &self.locator
    }

    fn documents(&self) -> Box<dyn Iterator<Item = Result<RawDocument>> + Send + '_> {
        Box::new(self.paths.iter().map(|path| {
            fs::read(path)
                .map(|content| RawDocument::new(RawDocument::name_for(path), path.clone(), content))
                .map_err(|source| ParserError::IoError {
                    path: path.clone(),
                    source,
                })
        }))
    }

    fn len(&self) -> usize {
        self.paths.len()
    }
}

/// Serves documents already held in memory
#[derive(Debug, Clone)]
pub struct InMemoryPreprocessor {
    locator: PathBuf,
    documents: Vec<RawDocument>,
}

impl InMemoryPreprocessor {
    /// Create an empty in-memory source
    pub fn new() -> Self {
        Self {
            locator: PathBuf::from("<memory>"),
            documents: Vec::new(),
        }
    }

    /// Add an HTML document
    pub fn with_html(mut self, name: impl Into<String>, html: impl Into<String>) -> Self {
        let name = name.into();
        let path = PathBuf::from(format!("<memory>/{name}.html"));
        self.documents
            .push(RawDocument::new(name, path, html.into().into_bytes()));
        self
    }

    /// Add a raw record
    pub fn push(&mut self, document: RawDocument) {
        self.documents.push(document);
    }
}

impl Default for InMemoryPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocPreprocessor for InMemoryPreprocessor {
    fn locator(&self) -> &Path {
        &self.locator
    }

    fn documents(&self) -> Box<dyn Iterator<Item = Result<RawDocument>> + Send + '_> {
        Box::new(
            self.documents
                .iter()
                .cloned()
                .map(|doc| Ok::<_, ParserError>(doc)),
        )
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

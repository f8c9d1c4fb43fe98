//! Corpus parser
//!
//! Parses every record of a preprocessor on a fixed worker pool and writes
//! the results into the shared store. A document that fails to parse is
//! recorded in the store and left out of the "last documents" set; it never
//! aborts the other documents of the batch.

use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use relx_core::{worker_pool, CorpusStore, Document, ParseFailureRecord};

use crate::{DocPreprocessor, HtmlParser, ParserError, ParserOptions, RawDocument};

/// Counts from one `apply` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub parsed: usize,
    pub failed: usize,
}

impl ParseSummary {
    /// Records seen
    pub fn total(&self) -> usize {
        self.parsed + self.failed
    }

    /// Fraction of records that failed
    pub fn failure_ratio(&self) -> f32 {
        if self.total() == 0 {
            0.0
        } else {
            self.failed as f32 / self.total() as f32
        }
    }
}

enum Outcome {
    Parsed(String),
    Failed(ParseFailureRecord),
}

/// Parses documents into the corpus store
pub struct CorpusParser {
    store: Arc<dyn CorpusStore>,
    parser: HtmlParser,
    max_document_bytes: usize,
    last_documents: Vec<String>,
    last_failures: Vec<ParseFailureRecord>,
}

impl CorpusParser {
    /// Create a parser writing into `store`
    pub fn new(store: Arc<dyn CorpusStore>, options: ParserOptions) -> Self {
        Self {
            store,
            parser: HtmlParser::new(options),
            max_document_bytes: usize::MAX,
            last_documents: Vec::new(),
            last_failures: Vec::new(),
        }
    }

    /// Record documents above `limit` bytes as parse failures
    pub fn with_max_document_bytes(mut self, limit: usize) -> Self {
        self.max_document_bytes = limit;
        self
    }

    /// Parse every record of `source`
    ///
    /// With `clear`, each document's prior state (and everything derived
    /// from it) is purged before the new parse is written. Documents not in
    /// `source` are never touched.
    pub fn apply(
        &mut self,
        source: &dyn DocPreprocessor,
        clear: bool,
        parallelism: usize,
    ) -> relx_core::Result<ParseSummary> {
        let pool = worker_pool(parallelism)?;
        info!(
            source = %source.locator().display(),
            documents = source.len(),
            parallelism,
            clear,
            "Parsing documents"
        );

        let outcomes: Vec<relx_core::Result<Outcome>> = pool.install(|| {
            source
                .documents()
                .par_bridge()
                .map(|record| self.parse_one(record, clear))
                .collect()
        });

        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome? {
                Outcome::Parsed(name) => documents.push(name),
                Outcome::Failed(record) => failures.push(record),
            }
        }
        documents.sort();
        documents.dedup();
        failures.sort_by(|a, b| a.document.cmp(&b.document));

        let summary = ParseSummary {
            parsed: documents.len(),
            failed: failures.len(),
        };
        info!(
            parsed = summary.parsed,
            failed = summary.failed,
            "Parsing complete"
        );

        self.last_documents = documents;
        self.last_failures = failures;
        Ok(summary)
    }

    fn parse_one(
        &self,
        record: crate::Result<RawDocument>,
        clear: bool,
    ) -> relx_core::Result<Outcome> {
        let raw = match record {
            Ok(raw) => raw,
            Err(err) => {
                let path = match &err {
                    ParserError::IoError { path, .. } => path.clone(),
                    _ => PathBuf::new(),
                };
                return self.fail(RawDocument::name_for(&path), path, err);
            }
        };

        if clear {
            self.store.clear_documents(std::slice::from_ref(&raw.name))?;
        }

        match self.parse_raw(&raw) {
            Ok(document) => {
                debug!(
                    document = %raw.name,
                    sentences = document.sentences.len(),
                    words = document.word_count(),
                    "Parsed document"
                );
                self.store.upsert_document(document)?;
                Ok(Outcome::Parsed(raw.name))
            }
            Err(err) => self.fail(raw.name, raw.path, err),
        }
    }

    fn parse_raw(&self, raw: &RawDocument) -> crate::Result<Document> {
        if raw.content.len() > self.max_document_bytes {
            return Err(ParserError::TooLarge {
                document: raw.name.clone(),
                size: raw.content.len(),
                limit: self.max_document_bytes,
            });
        }

        let content = std::str::from_utf8(&raw.content)
            .map_err(|_| ParserError::EncodingError(raw.name.clone()))?;

        Ok(self.parser.parse(&raw.name, &raw.path, content))
    }

    fn fail(
        &self,
        name: String,
        path: PathBuf,
        err: ParserError,
    ) -> relx_core::Result<Outcome> {
        warn!(document = %name, error = %err, "Failed to parse document");
        let record = ParseFailureRecord::new(name, path, err.to_string());
        self.store.record_parse_failure(record.clone())?;
        Ok(Outcome::Failed(record))
    }

    /// Documents successfully parsed by the most recent `apply`
    pub fn get_last_documents(&self) -> relx_core::Result<Vec<Arc<Document>>> {
        let mut documents = Vec::with_capacity(self.last_documents.len());
        for name in &self.last_documents {
            if let Some(document) = self.store.document(name)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    /// Names of the documents successfully parsed by the most recent `apply`
    pub fn last_document_names(&self) -> &[String] {
        &self.last_documents
    }

    /// Failures recorded by the most recent `apply`
    pub fn last_failures(&self) -> &[ParseFailureRecord] {
        &self.last_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HtmlDocPreprocessor, InMemoryPreprocessor};
    use relx_core::MemoryStore;

    fn parser(store: &Arc<MemoryStore>) -> CorpusParser {
        CorpusParser::new(store.clone(), ParserOptions::default())
    }

    #[test]
    fn test_apply_tracks_last_documents() {
        let store = Arc::new(MemoryStore::new());
        let mut corpus = parser(&store);

        let first = InMemoryPreprocessor::new().with_html("a", "<p>Alpha.</p>");
        corpus.apply(&first, false, 2).unwrap();
        assert_eq!(corpus.last_document_names(), ["a".to_string()]);

        let second = InMemoryPreprocessor::new()
            .with_html("c", "<p>Gamma.</p>")
            .with_html("b", "<p>Beta.</p>");
        let summary = corpus.apply(&second, false, 2).unwrap();

        assert_eq!(summary.parsed, 2);
        assert_eq!(
            corpus.last_document_names(),
            ["b".to_string(), "c".to_string()]
        );
        let docs = corpus.get_last_documents().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, "b");

        // Earlier documents stay in the store
        assert_eq!(store.document_count().unwrap(), 3);
    }

    #[test]
    fn test_failure_is_isolated_and_recorded() {
        let store = Arc::new(MemoryStore::new());
        let mut corpus = parser(&store);

        let mut source = InMemoryPreprocessor::new().with_html("good", "<p>Fine text.</p>");
        source.push(RawDocument::new("bad", "bad.html", vec![0xff, 0xfe, 0x00]));

        let summary = corpus.apply(&source, false, 4).unwrap();

        assert_eq!(summary, ParseSummary { parsed: 1, failed: 1 });
        assert_eq!(corpus.last_document_names(), ["good".to_string()]);
        assert_eq!(corpus.last_failures()[0].document, "bad");
        assert_eq!(store.parse_failures().unwrap().len(), 1);
        assert!(store.document("bad").unwrap().is_none());
    }

    #[test]
    fn test_size_limit() {
        let store = Arc::new(MemoryStore::new());
        let mut corpus = parser(&store).with_max_document_bytes(10);

        let source = InMemoryPreprocessor::new().with_html("big", "<p>This is far too long.</p>");
        let summary = corpus.apply(&source, false, 1).unwrap();

        assert_eq!(summary.failed, 1);
        assert!(corpus.last_failures()[0].reason.contains("limit is 10"));
        assert_eq!(summary.failure_ratio(), 1.0);
    }

    #[test]
    fn test_clear_only_touches_reparsed_documents() {
        let store = Arc::new(MemoryStore::new());
        let mut corpus = parser(&store);

        let source = InMemoryPreprocessor::new()
            .with_html("a", "<p>Alpha.</p>")
            .with_html("b", "<p>Beta.</p>");
        corpus.apply(&source, false, 2).unwrap();

        let again = InMemoryPreprocessor::new().with_html("a", "<p>Alpha again.</p>");
        corpus.apply(&again, true, 2).unwrap();

        assert_eq!(store.document_count().unwrap(), 2);
        let a = store.document("a").unwrap().unwrap();
        assert_eq!(a.sentences[0].text, "Alpha again.");
        assert!(store.document("b").unwrap().is_some());
    }

    #[test]
    fn test_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("obama.html"),
            "<html><body><p>Barack Obama was born in Honolulu.</p></body></html>",
        )
        .unwrap();

        let store = Arc::new(MemoryStore::new());
        let mut corpus = parser(&store);
        let source = HtmlDocPreprocessor::new(dir.path()).unwrap();
        corpus.apply(&source, false, 1).unwrap();

        let docs = corpus.get_last_documents().unwrap();
        assert_eq!(docs[0].name, "obama");
        assert_eq!(docs[0].sentences[0].words.len(), 7);
    }
}

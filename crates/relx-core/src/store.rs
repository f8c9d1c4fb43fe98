//! Corpus store
//!
//! Holds parsed documents, mentions, candidates and features shared by every
//! pipeline stage. Every clear operation is scoped: documents for the parse
//! and mention tables, a split for the candidate table. Clearing never
//! touches state that belongs to other documents or splits.
//!
//! Replacing a document with different content drops the mentions,
//! candidates and features extracted from the previous version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    Candidate, CandidateKey, Document, FeatureVector, Mention, MentionKey, RelxError, Result,
};

/// A document that could not be parsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseFailureRecord {
    pub document: String,
    pub source: PathBuf,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl ParseFailureRecord {
    pub fn new(
        document: impl Into<String>,
        source: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            document: document.into(),
            source: source.into(),
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Backing store shared across stages and prediction calls
///
/// Writes follow "last writer owns the slot" per document. Callers that run
/// overlapping batches concurrently must serialize them.
pub trait CorpusStore: Send + Sync {
    /// Namespace isolating this store's contents
    fn namespace(&self) -> &str;

    // --- documents -------------------------------------------------------

    /// Insert or replace a parsed document (clears any failure record).
    /// Replacing it with different content drops what was extracted from it.
    fn upsert_document(&self, document: Document) -> Result<()>;

    /// Look up a parsed document
    fn document(&self, name: &str) -> Result<Option<Arc<Document>>>;

    /// Number of parsed documents
    fn document_count(&self) -> Result<usize>;

    /// Remove documents and everything derived from them
    fn clear_documents(&self, names: &[String]) -> Result<()>;

    /// Record a per-document parse failure
    fn record_parse_failure(&self, failure: ParseFailureRecord) -> Result<()>;

    /// All recorded parse failures, ordered by document name
    fn parse_failures(&self) -> Result<Vec<ParseFailureRecord>>;

    // --- mentions --------------------------------------------------------

    /// Insert mentions, ignoring keys already present; returns the number added
    fn upsert_mentions(&self, mentions: Vec<Mention>) -> Result<usize>;

    /// Mentions of a document, ordered by key
    fn mentions(&self, document: &str) -> Result<Vec<Mention>>;

    /// Remove mentions of the given documents and candidates built on them
    fn clear_mentions(&self, documents: &[String]) -> Result<()>;

    // --- candidates ------------------------------------------------------

    /// Insert candidates, ignoring keys already present; returns the number added
    fn upsert_candidates(&self, candidates: Vec<Candidate>) -> Result<usize>;

    /// Candidates of a split, ordered by key
    fn candidates(&self, split: u32) -> Result<Vec<Candidate>>;

    /// Candidates of any split whose document is in `documents`
    fn candidates_of(&self, documents: &[String]) -> Result<Vec<Candidate>>;

    /// Remove all candidates (and their features) of a split
    fn clear_split(&self, split: u32) -> Result<()>;

    // --- feature keys ----------------------------------------------------

    /// Live feature-key table, in column order
    fn feature_keys(&self) -> Result<Vec<String>>;

    /// Remove the given keys from the live table
    fn drop_feature_keys(&self, keys: &[String]) -> Result<()>;

    /// Append the given keys that are not yet in the live table
    fn upsert_feature_keys(&self, keys: &[String]) -> Result<()>;

    // --- features --------------------------------------------------------

    /// Insert or replace the feature vector of a candidate
    fn upsert_features(&self, candidate: CandidateKey, features: FeatureVector) -> Result<()>;

    /// Feature vector of a candidate
    fn features(&self, candidate: &CandidateKey) -> Result<Option<FeatureVector>>;

    /// Remove feature vectors of candidates belonging to the given documents
    fn clear_features(&self, documents: &[String]) -> Result<()>;
}

#[derive(Debug, Default)]
struct Tables {
    documents: BTreeMap<String, Arc<Document>>,
    parse_failures: BTreeMap<String, ParseFailureRecord>,
    mentions: BTreeMap<String, BTreeMap<MentionKey, Mention>>,
    candidates: BTreeMap<u32, BTreeMap<CandidateKey, Candidate>>,
    feature_keys: Vec<String>,
    features: HashMap<CandidateKey, FeatureVector>,
}

impl Tables {
    fn remove_candidates_where(&mut self, predicate: impl Fn(&CandidateKey) -> bool) {
        for split in self.candidates.values_mut() {
            split.retain(|key, _| !predicate(key));
        }
        self.features.retain(|key, _| !predicate(key));
    }

    /// Drop everything extracted from a document, keeping the document itself
    fn purge_derived(&mut self, name: &str) {
        let targets = HashSet::from([name]);
        self.mentions.remove(name);
        self.remove_candidates_where(|key| touches(key, &targets));
    }
}

fn touches(key: &CandidateKey, documents: &HashSet<&str>) -> bool {
    key.mentions
        .first()
        .is_some_and(|m| documents.contains(m.document.as_str()))
}

/// In-process corpus store
#[derive(Debug)]
pub struct MemoryStore {
    namespace: String,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create a store in the default namespace
    pub fn new() -> Self {
        Self::with_namespace("default")
    }

    /// Create a store in a named namespace
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| RelxError::StoreError(format!("{} store lock poisoned", self.namespace)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| RelxError::StoreError(format!("{} store lock poisoned", self.namespace)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusStore for MemoryStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn upsert_document(&self, document: Document) -> Result<()> {
        let mut tables = self.write()?;
        tables.parse_failures.remove(&document.name);

        let stale = tables
            .documents
            .get(&document.name)
            .is_some_and(|old| {
                old.source != document.source || old.sentences != document.sentences
            });
        if stale {
            tables.purge_derived(&document.name);
        }

        tables
            .documents
            .insert(document.name.clone(), Arc::new(document));
        Ok(())
    }

    fn document(&self, name: &str) -> Result<Option<Arc<Document>>> {
        Ok(self.read()?.documents.get(name).cloned())
    }

    fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.documents.len())
    }

    fn clear_documents(&self, names: &[String]) -> Result<()> {
        let targets: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut tables = self.write()?;

        for name in names {
            tables.documents.remove(name);
            tables.parse_failures.remove(name);
            tables.mentions.remove(name);
        }
        tables.remove_candidates_where(|key| touches(key, &targets));

        Ok(())
    }

    fn record_parse_failure(&self, failure: ParseFailureRecord) -> Result<()> {
        let mut tables = self.write()?;
        if tables.documents.remove(&failure.document).is_some() {
            tables.purge_derived(&failure.document);
        }
        tables
            .parse_failures
            .insert(failure.document.clone(), failure);
        Ok(())
    }

    fn parse_failures(&self) -> Result<Vec<ParseFailureRecord>> {
        Ok(self.read()?.parse_failures.values().cloned().collect())
    }

    fn upsert_mentions(&self, mentions: Vec<Mention>) -> Result<usize> {
        let mut tables = self.write()?;
        let mut added = 0;

        for mention in mentions {
            let slot = tables.mentions.entry(mention.document.clone()).or_default();
            let key = mention.key();
            if !slot.contains_key(&key) {
                slot.insert(key, mention);
                added += 1;
            }
        }

        Ok(added)
    }

    fn mentions(&self, document: &str) -> Result<Vec<Mention>> {
        Ok(self
            .read()?
            .mentions
            .get(document)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    fn clear_mentions(&self, documents: &[String]) -> Result<()> {
        let targets: HashSet<&str> = documents.iter().map(String::as_str).collect();
        let mut tables = self.write()?;

        for name in documents {
            tables.mentions.remove(name);
        }
        tables.remove_candidates_where(|key| touches(key, &targets));

        Ok(())
    }

    fn upsert_candidates(&self, candidates: Vec<Candidate>) -> Result<usize> {
        let mut tables = self.write()?;
        let mut added = 0;

        for candidate in candidates {
            let slot = tables.candidates.entry(candidate.split).or_default();
            let key = candidate.key();
            if !slot.contains_key(&key) {
                slot.insert(key, candidate);
                added += 1;
            }
        }

        Ok(added)
    }

    fn candidates(&self, split: u32) -> Result<Vec<Candidate>> {
        Ok(self
            .read()?
            .candidates
            .get(&split)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn candidates_of(&self, documents: &[String]) -> Result<Vec<Candidate>> {
        let targets: HashSet<&str> = documents.iter().map(String::as_str).collect();
        let tables = self.read()?;

        Ok(tables
            .candidates
            .values()
            .flat_map(|split| split.iter())
            .filter(|(key, _)| touches(key, &targets))
            .map(|(_, candidate)| candidate.clone())
            .collect())
    }

    fn clear_split(&self, split: u32) -> Result<()> {
        let mut tables = self.write()?;
        tables.candidates.remove(&split);
        tables.features.retain(|key, _| key.split != split);
        Ok(())
    }

    fn feature_keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.feature_keys.clone())
    }

    fn drop_feature_keys(&self, keys: &[String]) -> Result<()> {
        let doomed: HashSet<&str> = keys.iter().map(String::as_str).collect();
        self.write()?
            .feature_keys
            .retain(|k| !doomed.contains(k.as_str()));
        Ok(())
    }

    fn upsert_feature_keys(&self, keys: &[String]) -> Result<()> {
        let mut tables = self.write()?;
        let mut present: BTreeSet<String> = tables.feature_keys.iter().cloned().collect();

        for key in keys {
            if present.insert(key.clone()) {
                tables.feature_keys.push(key.clone());
            }
        }

        Ok(())
    }

    fn upsert_features(&self, candidate: CandidateKey, features: FeatureVector) -> Result<()> {
        self.write()?.features.insert(candidate, features);
        Ok(())
    }

    fn features(&self, candidate: &CandidateKey) -> Result<Option<FeatureVector>> {
        Ok(self.read()?.features.get(candidate).cloned())
    }

    fn clear_features(&self, documents: &[String]) -> Result<()> {
        let targets: HashSet<&str> = documents.iter().map(String::as_str).collect();
        self.write()?
            .features
            .retain(|key, _| !touches(key, &targets));
        Ok(())
    }
}

//! Featurizer
//!
//! Writes one sparse feature vector per candidate into the store and turns
//! candidate lists into dense matrices whose columns follow the live
//! feature-key table. Keys outside that table are dropped at generation
//! time, never added.
//!
//! Author: hephaex@gmail.com

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info};

use relx_core::{
    worker_pool, Candidate, CorpusStore, Document, FeatureVector, RelxError, Result,
};

use crate::features::FeatureLibrary;
use crate::vocabulary::Vocabulary;

/// Dense `candidates x feature keys` matrix
pub type FeatureMatrix = Array2<f32>;

pub struct Featurizer {
    store: Arc<dyn CorpusStore>,
    library: FeatureLibrary,
    parallelism: usize,
    pinned: Option<Vocabulary>,
}

impl Featurizer {
    pub fn new(store: Arc<dyn CorpusStore>, library: FeatureLibrary) -> Self {
        Self {
            store,
            library,
            parallelism: relx_core::config::default_parallelism(),
            pinned: None,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Remove keys from the live table
    pub fn drop_keys(&self, keys: &[String]) -> Result<()> {
        self.store.drop_feature_keys(keys)
    }

    /// Append keys missing from the live table
    pub fn upsert_keys(&self, keys: &[String]) -> Result<()> {
        self.store.upsert_feature_keys(keys)
    }

    /// Force the live table to exactly `vocabulary`
    ///
    /// Dropping then re-inserting puts the keys back in snapshot order. Any
    /// key left over from elsewhere makes the table diverge, which is an
    /// error.
    pub fn pin_vocabulary(&mut self, vocabulary: Vocabulary) -> Result<()> {
        self.drop_keys(vocabulary.keys())?;
        self.upsert_keys(vocabulary.keys())?;
        vocabulary.verify(&self.store.feature_keys()?)?;

        info!(keys = vocabulary.len(), "Pinned feature vocabulary");
        self.pinned = Some(vocabulary);
        Ok(())
    }

    /// The pinned vocabulary, if any
    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.pinned.as_ref()
    }

    /// Featurize every stored candidate of `documents`
    ///
    /// With `clear`, prior feature rows of these documents are removed
    /// first. Returns the number of candidates featurized.
    pub fn apply(&self, documents: &[Arc<Document>], clear: bool) -> Result<usize> {
        let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();
        if clear {
            self.store.clear_features(&names)?;
        }

        let live: HashSet<String> = self.store.feature_keys()?.into_iter().collect();
        let candidates = self.store.candidates_of(&names)?;

        let pool = worker_pool(self.parallelism)?;
        pool.install(|| {
            candidates
                .par_iter()
                .map(|candidate| {
                    let document = documents
                        .iter()
                        .find(|d| d.name == candidate.document())
                        .ok_or_else(|| {
                            RelxError::StoreError(format!(
                                "candidate refers to unknown document {}",
                                candidate.document()
                            ))
                        })?;
                    let features = self.featurize(candidate, document, &live);
                    self.store.upsert_features(candidate.key(), features)
                })
                .collect::<Result<Vec<()>>>()
        })?;

        info!(
            documents = documents.len(),
            candidates = candidates.len(),
            keys = live.len(),
            clear,
            "Featurization complete"
        );
        Ok(candidates.len())
    }

    fn featurize(
        &self,
        candidate: &Candidate,
        document: &Document,
        live: &HashSet<String>,
    ) -> FeatureVector {
        let generated = self.library.extract(candidate, document);
        let total = generated.len();
        let kept: FeatureVector = generated
            .into_iter()
            .filter(|key| live.contains(key))
            .map(|key| (key, 1.0))
            .collect();

        debug!(
            document = %document.name,
            generated = total,
            kept = kept.len(),
            "Featurized candidate"
        );
        kept
    }

    /// One matrix per candidate list, rows aligned with list order
    ///
    /// Fails with `VocabularyMismatch` if the live key table no longer
    /// matches the pinned vocabulary, and with `StageOrderViolation` if a
    /// candidate has not been featurized.
    pub fn get_feature_matrices(
        &self,
        candidate_sets: &[Vec<Candidate>],
    ) -> Result<Vec<FeatureMatrix>> {
        let keys = self.store.feature_keys()?;
        if let Some(vocabulary) = &self.pinned {
            vocabulary.verify(&keys)?;
        }
        let columns: HashMap<&str, usize> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.as_str(), i))
            .collect();

        candidate_sets
            .iter()
            .map(|candidates| {
                let mut matrix = FeatureMatrix::zeros((candidates.len(), keys.len()));
                for (row, candidate) in candidates.iter().enumerate() {
                    let features = self.store.features(&candidate.key())?.ok_or_else(|| {
                        RelxError::StageOrderViolation {
                            expected: "FEATURIZE".to_string(),
                            found: format!("unfeaturized candidate in {}", candidate.document()),
                        }
                    })?;
                    for (key, weight) in features {
                        if let Some(&col) = columns.get(key.as_str()) {
                            matrix[[row, col]] = weight;
                        }
                    }
                }
                Ok(matrix)
            })
            .collect()
    }
}

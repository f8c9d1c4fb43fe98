//! Prediction facade
//!
//! Built once per process: the schema, vocabulary and model are loaded up
//! front and reused by every `predict` call. The store is injected, so
//! callers wanting isolation pass stores with distinct namespaces.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, info_span};
use uuid::Uuid;

use relx_core::{
    AppConfig, Candidate, CorpusStore, EntityRelation, Label, MemoryStore, PipelineConfig,
    RelxError, Result,
};
use relx_extractor::{unique_entity_relations, CandidateExtractor, ExtractionSchema, MentionExtractor};
use relx_learning::{FeatureLibrary, Featurizer, LogisticRegression, Vocabulary};
use relx_parser::{CorpusParser, DocPreprocessor, HtmlDocPreprocessor, ParserOptions};

use crate::stage::{Stage, StageMachine};

/// Relations extracted from one input locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub source: PathBuf,
    pub relations: Vec<EntityRelation>,
}

pub struct PredictionFacade {
    store: Arc<dyn CorpusStore>,
    config: PipelineConfig,
    class_name: String,
    class_index: usize,
    parser: CorpusParser,
    mention_extractor: MentionExtractor,
    candidate_extractor: CandidateExtractor,
    featurizer: Featurizer,
    model: LogisticRegression,
}

impl PredictionFacade {
    /// Assemble a facade from loaded artifacts
    ///
    /// The model must have been built for exactly `vocabulary.len()`
    /// features. The live feature-key table is pinned to `vocabulary`.
    pub fn new(
        store: Arc<dyn CorpusStore>,
        schema: ExtractionSchema,
        vocabulary: Vocabulary,
        model: LogisticRegression,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;

        if model.n_features() != vocabulary.len() {
            return Err(RelxError::CheckpointMismatch(format!(
                "model has {} inputs, vocabulary has {} keys",
                model.n_features(),
                vocabulary.len()
            )));
        }

        let class_index = match &config.candidate_class {
            Some(name) => schema.candidate_class_index(name).ok_or_else(|| {
                RelxError::SchemaError(format!("unknown candidate class {name}"))
            })?,
            None => 0,
        };
        let class_name = schema.candidate_classes()[class_index].name.clone();

        let parser = CorpusParser::new(store.clone(), ParserOptions::default())
            .with_max_document_bytes(config.max_document_bytes);
        let mention_extractor = MentionExtractor::new(store.clone(), &schema);
        let candidate_extractor = CandidateExtractor::new(store.clone(), &schema);
        let mut featurizer = Featurizer::new(store.clone(), FeatureLibrary::default())
            .with_parallelism(config.parallelism);
        featurizer.pin_vocabulary(vocabulary)?;

        info!(
            namespace = store.namespace(),
            candidate_class = %class_name,
            parallelism = config.parallelism,
            threshold = config.threshold,
            "Prediction facade ready"
        );

        Ok(Self {
            store,
            config,
            class_name,
            class_index,
            parser,
            mention_extractor,
            candidate_extractor,
            featurizer,
            model,
        })
    }

    /// Load schema, vocabulary and checkpoint from the configured paths
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let schema_path = config.pipeline.schema_path.as_ref().ok_or_else(|| {
            RelxError::ConfigError("pipeline.schema_path is required".to_string())
        })?;
        let schema = ExtractionSchema::from_file(schema_path)?;
        let vocabulary = Vocabulary::from_file(&config.model.vocabulary_path)?;
        let model = LogisticRegression::load(&config.model.checkpoint_path, vocabulary.len())?;

        Self::new(
            Arc::new(MemoryStore::new()),
            schema,
            vocabulary,
            model,
            config.pipeline.clone(),
        )
    }

    pub fn store(&self) -> &Arc<dyn CorpusStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Name of the scored candidate class
    pub fn candidate_class(&self) -> &str {
        &self.class_name
    }

    /// Predict relations for each locator
    ///
    /// Every locator is resolved before anything is parsed, so a bad path
    /// fails the call without touching the store.
    pub fn predict<P: AsRef<Path>>(&mut self, filenames: &[P]) -> Result<Vec<Prediction>> {
        let sources = filenames
            .iter()
            .map(|f| HtmlDocPreprocessor::new(f.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut predictions = Vec::with_capacity(sources.len());
        for source in &sources {
            let relations = self.predict_source(source)?;
            predictions.push(Prediction {
                source: source.locator().to_path_buf(),
                relations,
            });
        }
        Ok(predictions)
    }

    /// Run one invocation over a single preprocessor
    pub fn predict_source(&mut self, source: &dyn DocPreprocessor) -> Result<Vec<EntityRelation>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("predict", %run_id, source = %source.locator().display());
        let _guard = span.enter();
        let started = Instant::now();

        let mut stages = StageMachine::new();
        let parallelism = self.config.parallelism;

        stages.enter(Stage::Parse)?;
        let summary = self
            .parser
            .apply(source, self.config.parse_clear, parallelism)?;
        if summary.failed > 0 && summary.failure_ratio() >= self.config.max_parse_failure_ratio {
            return Err(RelxError::TooManyParseFailures {
                failed: summary.failed,
                total: summary.total(),
            });
        }
        let documents = self.parser.get_last_documents()?;

        stages.enter(Stage::ExtractMentions)?;
        self.mention_extractor
            .apply(&documents, self.config.mention_clear, parallelism)?;

        stages.enter(Stage::ExtractCandidates)?;
        self.candidate_extractor.apply(
            &documents,
            self.config.split,
            self.config.candidate_clear,
            parallelism,
        )?;
        let names: HashSet<&str> = documents.iter().map(|d| d.name.as_str()).collect();
        let candidates: Vec<Candidate> = self
            .candidate_extractor
            .get_candidates(self.config.split)?
            .swap_remove(self.class_index)
            .into_iter()
            .filter(|c| names.contains(c.document()))
            .collect();

        stages.enter(Stage::Featurize)?;
        self.featurizer
            .apply(&documents, self.config.feature_clear)?;
        let matrix = self
            .featurizer
            .get_feature_matrices(std::slice::from_ref(&candidates))?
            .swap_remove(0);

        stages.enter(Stage::Score)?;
        let positive = self.config.positive_label;
        let labels = self
            .model
            .predict(&candidates, &matrix, self.config.threshold, positive)?;
        let accepted: Vec<&Candidate> = candidates
            .iter()
            .zip(&labels)
            .filter(|(_, label)| **label == positive)
            .map(|(c, _)| c)
            .collect();

        stages.enter(Stage::Deduplicate)?;
        let relations = unique_entity_relations(accepted.iter().copied());

        stages.enter(Stage::Done)?;
        info!(
            documents = documents.len(),
            candidates = candidates.len(),
            accepted = accepted.len(),
            relations = relations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prediction complete"
        );
        Ok(relations)
    }

    /// Label that marks a candidate as an accepted relation
    pub fn positive_label(&self) -> Label {
        self.config.positive_label
    }
}

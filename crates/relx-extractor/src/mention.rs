//! Mention extractor

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use relx_core::{worker_pool, CorpusStore, Document, Mention, Result};

use crate::schema::{ExtractionSchema, MentionClass};

/// Runs every mention class over a batch of documents
pub struct MentionExtractor {
    store: Arc<dyn CorpusStore>,
    classes: Vec<MentionClass>,
}

impl MentionExtractor {
    pub fn new(store: Arc<dyn CorpusStore>, schema: &ExtractionSchema) -> Self {
        Self {
            store,
            classes: schema.mention_classes().to_vec(),
        }
    }

    /// Extract mentions of `documents` into the store
    ///
    /// `clear` removes the prior mentions of these documents (and the
    /// candidates built on them) first. Mentions are keyed, so applying the
    /// same batch twice adds nothing the second time. Returns the number of
    /// mentions added.
    pub fn apply(
        &self,
        documents: &[Arc<Document>],
        clear: bool,
        parallelism: usize,
    ) -> Result<usize> {
        if clear {
            let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();
            self.store.clear_mentions(&names)?;
        }

        let pool = worker_pool(parallelism)?;
        let added: Vec<usize> = pool.install(|| {
            documents
                .par_iter()
                .map(|document| {
                    let mentions = self.extract(document);
                    debug!(
                        document = %document.name,
                        mentions = mentions.len(),
                        "Extracted mentions"
                    );
                    self.store.upsert_mentions(mentions)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let total = added.iter().sum();
        info!(
            documents = documents.len(),
            added = total,
            clear,
            "Mention extraction complete"
        );
        Ok(total)
    }

    /// Mentions of one document, without touching the store
    pub fn extract(&self, document: &Document) -> Vec<Mention> {
        let mut mentions = Vec::new();

        for class in &self.classes {
            let spans = class.space.spans(document);
            for span in class.matcher.apply(document, spans) {
                mentions.push(Mention::new(class.name.as_str(), document.name.as_str(), span));
            }
        }

        mentions
    }

    /// Stored mentions of `documents`, in key order per document
    pub fn get_mentions(&self, documents: &[Arc<Document>]) -> Result<Vec<Mention>> {
        let mut mentions = Vec::new();
        for document in documents {
            mentions.extend(self.store.mentions(&document.name)?);
        }
        Ok(mentions)
    }
}

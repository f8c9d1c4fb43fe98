//! Candidate extractor
//!
//! Enumerates, per candidate class, every combination of one stored mention
//! per slot within a single document, then applies the class's relation
//! options and throttler.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use relx_core::{worker_pool, Candidate, CorpusStore, Document, Mention, Result};

use crate::schema::{CandidateClass, ExtractionSchema};

/// Builds relation candidates from stored mentions
pub struct CandidateExtractor {
    store: Arc<dyn CorpusStore>,
    classes: Vec<CandidateClass>,
}

impl CandidateExtractor {
    pub fn new(store: Arc<dyn CorpusStore>, schema: &ExtractionSchema) -> Self {
        Self {
            store,
            classes: schema.candidate_classes().to_vec(),
        }
    }

    /// Candidate classes, in matrix order
    pub fn classes(&self) -> &[CandidateClass] {
        &self.classes
    }

    /// Generate candidates of `documents` under `split`
    ///
    /// With `clear`, the whole split is purged first; candidates of a split
    /// are always regenerated from the current mention set. Returns the
    /// number of candidates added.
    pub fn apply(
        &self,
        documents: &[Arc<Document>],
        split: u32,
        clear: bool,
        parallelism: usize,
    ) -> Result<usize> {
        if clear {
            self.store.clear_split(split)?;
        }

        let pool = worker_pool(parallelism)?;
        let added: Vec<usize> = pool.install(|| {
            documents
                .par_iter()
                .map(|document| {
                    let candidates = self.extract(&document.name, split)?;
                    debug!(
                        document = %document.name,
                        candidates = candidates.len(),
                        "Extracted candidates"
                    );
                    self.store.upsert_candidates(candidates)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let total = added.iter().sum();
        info!(
            documents = documents.len(),
            split,
            added = total,
            clear,
            "Candidate extraction complete"
        );
        Ok(total)
    }

    /// Candidates of one document for every class, without touching the store
    pub fn extract(&self, document: &str, split: u32) -> Result<Vec<Candidate>> {
        let mut by_class: BTreeMap<&str, Vec<Mention>> = BTreeMap::new();
        let mentions = self.store.mentions(document)?;
        for mention in &mentions {
            by_class
                .entry(mention.class.as_str())
                .or_default()
                .push(mention.clone());
        }

        let mut candidates = Vec::new();
        for class in &self.classes {
            let slots: Vec<&[Mention]> = class
                .mentions
                .iter()
                .map(|name| by_class.get(name.as_str()).map_or(&[][..], Vec::as_slice))
                .collect();

            for tuple in cartesian(&slots) {
                if admits(class, &tuple) {
                    candidates.push(Candidate::new(class.name.as_str(), split, tuple)?);
                }
            }
        }

        Ok(candidates)
    }

    /// Candidates of a split, one list per class in schema order
    pub fn get_candidates(&self, split: u32) -> Result<Vec<Vec<Candidate>>> {
        let stored = self.store.candidates(split)?;
        Ok(self
            .classes
            .iter()
            .map(|class| {
                stored
                    .iter()
                    .filter(|c| c.class == class.name)
                    .cloned()
                    .collect()
            })
            .collect())
    }
}

/// Every tuple taking one mention per slot, in slot-major order
fn cartesian(slots: &[&[Mention]]) -> Vec<Vec<Mention>> {
    if slots.is_empty() || slots.iter().any(|s| s.is_empty()) {
        return Vec::new();
    }

    let mut tuples: Vec<Vec<Mention>> = vec![Vec::new()];
    for slot in slots {
        tuples = tuples
            .into_iter()
            .flat_map(|prefix| {
                slot.iter().map(move |mention| {
                    let mut tuple = prefix.clone();
                    tuple.push(mention.clone());
                    tuple
                })
            })
            .collect();
    }
    tuples
}

fn admits(class: &CandidateClass, tuple: &[Mention]) -> bool {
    for i in 0..tuple.len() {
        for j in (i + 1)..tuple.len() {
            let (a, b) = (&tuple[i].span, &tuple[j].span);
            if a.same_extent(b) {
                if !class.self_relations {
                    return false;
                }
            } else if a.overlaps(b) && !class.nested_relations {
                return false;
            }

            // Keep a single ordering of interchangeable slots
            if !class.symmetric_relations
                && class.mentions[i] == class.mentions[j]
                && tuple[i].key() > tuple[j].key()
            {
                return false;
            }
        }
    }

    class.throttler.as_ref().map_or(true, |throttle| throttle(tuple))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DictionaryMatcher, MentionClass, MentionExtractor, Ngrams, RegexMatcher};
    use relx_core::{EntityRelation, MemoryStore};
    use relx_parser::HtmlParser;
    use std::path::Path;

    fn doc(name: &str, html: &str) -> Arc<Document> {
        Arc::new(HtmlParser::default().parse(name, Path::new("x.html"), html))
    }

    fn run(schema: &ExtractionSchema, docs: &[Arc<Document>]) -> (Arc<MemoryStore>, CandidateExtractor) {
        let store = Arc::new(MemoryStore::new());
        MentionExtractor::new(store.clone(), schema)
            .apply(docs, false, 2)
            .unwrap();
        let extractor = CandidateExtractor::new(store.clone(), schema);
        extractor.apply(docs, 2, true, 2).unwrap();
        (store, extractor)
    }

    fn relations(candidates: &[Candidate]) -> Vec<String> {
        candidates
            .iter()
            .map(|c| c.entity_relation().to_string())
            .collect()
    }

    fn born_in() -> ExtractionSchema {
        ExtractionSchema::new(
            vec![
                MentionClass::new(
                    "Person",
                    Ngrams::new(2),
                    DictionaryMatcher::new(["Barack Obama", "Bill Clinton"]),
                ),
                MentionClass::new(
                    "Place",
                    Ngrams::new(1),
                    DictionaryMatcher::new(["Honolulu", "Hope"]),
                ),
            ],
            vec![CandidateClass::new("BornIn", ["Person", "Place"])],
        )
        .unwrap()
    }

    #[test]
    fn test_cartesian_within_document() {
        let schema = born_in();
        let docs = vec![
            doc("a", "<p>Barack Obama and Bill Clinton visited Honolulu.</p>"),
            doc("b", "<p>Hope</p>"),
        ];
        let (_, extractor) = run(&schema, &docs);

        let candidates = &extractor.get_candidates(2).unwrap()[0];
        assert_eq!(
            relations(candidates),
            vec!["('Barack Obama', 'Honolulu')", "('Bill Clinton', 'Honolulu')"]
        );
        assert!(candidates.iter().all(|c| c.split == 2 && c.arity() == 2));
    }

    #[test]
    fn test_symmetric_and_self_relations() {
        let person = MentionClass::new(
            "Person",
            Ngrams::new(2),
            DictionaryMatcher::new(["Barack Obama", "Bill Clinton"]),
        );
        let html = "<p>Barack Obama met Bill Clinton.</p>";

        let symmetric = ExtractionSchema::new(
            vec![person.clone()],
            vec![CandidateClass::new("Met", ["Person", "Person"])],
        )
        .unwrap();
        let (_, extractor) = run(&symmetric, &[doc("a", html)]);
        assert_eq!(extractor.get_candidates(2).unwrap()[0].len(), 2);

        let ordered = ExtractionSchema::new(
            vec![person.clone()],
            vec![CandidateClass::new("Met", ["Person", "Person"]).with_symmetric_relations(false)],
        )
        .unwrap();
        let (_, extractor) = run(&ordered, &[doc("a", html)]);
        assert_eq!(
            relations(&extractor.get_candidates(2).unwrap()[0]),
            vec!["('Barack Obama', 'Bill Clinton')"]
        );

        let reflexive = ExtractionSchema::new(
            vec![person],
            vec![CandidateClass::new("Met", ["Person", "Person"]).with_self_relations(true)],
        )
        .unwrap();
        let (_, extractor) = run(&reflexive, &[doc("a", html)]);
        assert_eq!(extractor.get_candidates(2).unwrap()[0].len(), 4);
    }

    #[test]
    fn test_nested_relations() {
        let schema = |nested: bool| {
            ExtractionSchema::new(
                vec![
                    MentionClass::new(
                        "Full",
                        Ngrams::new(2),
                        DictionaryMatcher::new(["Barack Obama"]),
                    ),
                    MentionClass::new("Last", Ngrams::new(1), DictionaryMatcher::new(["Obama"])),
                ],
                vec![CandidateClass::new("Alias", ["Full", "Last"]).with_nested_relations(nested)],
            )
            .unwrap()
        };
        let docs = [doc("a", "<p>Barack Obama</p>")];

        let (_, extractor) = run(&schema(false), &docs);
        assert!(extractor.get_candidates(2).unwrap()[0].is_empty());

        let (_, extractor) = run(&schema(true), &docs);
        assert_eq!(extractor.get_candidates(2).unwrap()[0].len(), 1);
    }

    #[test]
    fn test_throttler() {
        let schema = ExtractionSchema::new(
            born_in().mention_classes().to_vec(),
            vec![CandidateClass::new("BornIn", ["Person", "Place"])
                .with_throttler(|m| m[0].span.sentence == m[1].span.sentence)],
        )
        .unwrap();
        let docs = [doc(
            "a",
            "<p>Barack Obama lived in Honolulu.</p><p>Bill Clinton.</p>",
        )];
        let (_, extractor) = run(&schema, &docs);

        assert_eq!(
            relations(&extractor.get_candidates(2).unwrap()[0]),
            vec!["('Barack Obama', 'Honolulu')"]
        );
    }

    #[test]
    fn test_unary_relation_arity() {
        let schema = ExtractionSchema::new(
            vec![MentionClass::new(
                "Year",
                Ngrams::new(1),
                RegexMatcher::new(r"\d{4}").unwrap(),
            )],
            vec![CandidateClass::new("Founded", ["Year"])],
        )
        .unwrap();
        let (_, extractor) = run(&schema, &[doc("a", "<p>Founded in 1961.</p>")]);

        let candidates = &extractor.get_candidates(2).unwrap()[0];
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].entity_relation(),
            EntityRelation(vec!["1961".to_string()])
        );
    }

    #[test]
    fn test_clear_replaces_split_only() {
        let schema = born_in();
        let docs = vec![doc("a", "<p>Barack Obama Honolulu</p>")];
        let (store, extractor) = run(&schema, &docs);

        extractor.apply(&docs, 0, false, 1).unwrap();
        let other = vec![doc("b", "<p>Bill Clinton Hope</p>")];
        MentionExtractor::new(store.clone(), &schema)
            .apply(&other, false, 1)
            .unwrap();
        extractor.apply(&other, 2, true, 1).unwrap();

        assert_eq!(
            relations(&extractor.get_candidates(2).unwrap()[0]),
            vec!["('Bill Clinton', 'Hope')"]
        );
        assert_eq!(store.candidates(0).unwrap().len(), 1);
    }

    #[test]
    fn test_no_mentions_no_candidates() {
        let (_, extractor) = run(&born_in(), &[doc("a", "<p>Nothing here</p>")]);
        assert!(extractor.get_candidates(2).unwrap()[0].is_empty());
    }
}

//! End-to-end extraction over parsed HTML with a TOML schema

use std::sync::Arc;

use relx_core::{CorpusStore, MemoryStore};
use relx_extractor::{unique_entity_relations, CandidateExtractor, ExtractionSchema, MentionExtractor};
use relx_parser::{CorpusParser, InMemoryPreprocessor, ParserOptions};

const SCHEMA: &str = r#"
[[mention_classes]]
name = "Presidentname"
space = { kind = "ngrams", n_max = 3 }
matcher = { kind = "dictionary", terms = ["Barack Obama", "Bill Clinton"] }

[[mention_classes]]
name = "Placeofbirth"
space = { kind = "ngrams", n_max = 2 }
matcher = { kind = "dictionary", terms = ["Honolulu", "Hope"] }

[[candidate_classes]]
name = "PresidentnamePlaceofbirth"
mentions = ["Presidentname", "Placeofbirth"]
throttle = { same_sentence = true }
"#;

fn corpus() -> InMemoryPreprocessor {
    InMemoryPreprocessor::new()
        .with_html(
            "obama",
            "<html><body><h1>Barack Obama</h1>\
             <p>Barack Obama was born in Honolulu. Barack Obama was born in Honolulu.</p>\
             </body></html>",
        )
        .with_html(
            "clinton",
            "<html><body><p>Bill Clinton was born in Hope.</p></body></html>",
        )
}

#[test]
fn test_parse_extract_and_deduplicate() {
    let store = Arc::new(MemoryStore::new());
    let schema = ExtractionSchema::from_toml_str(SCHEMA).unwrap();

    let mut parser = CorpusParser::new(store.clone(), ParserOptions::default());
    parser.apply(&corpus(), false, 2).unwrap();
    let docs = parser.get_last_documents().unwrap();

    MentionExtractor::new(store.clone(), &schema)
        .apply(&docs, false, 2)
        .unwrap();
    let candidates = CandidateExtractor::new(store.clone(), &schema);
    candidates.apply(&docs, 2, true, 2).unwrap();

    let per_class = candidates.get_candidates(2).unwrap();
    assert_eq!(per_class.len(), 1);
    // Two sentence-level occurrences in "obama", one in "clinton"
    assert_eq!(per_class[0].len(), 3);

    let relations: Vec<String> = unique_entity_relations(&per_class[0])
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        relations,
        vec!["('Barack Obama', 'Honolulu')", "('Bill Clinton', 'Hope')"]
    );
}

#[test]
fn test_reapplying_without_clear_adds_nothing() {
    let store = Arc::new(MemoryStore::new());
    let schema = ExtractionSchema::from_toml_str(SCHEMA).unwrap();

    let mut parser = CorpusParser::new(store.clone(), ParserOptions::default());
    parser.apply(&corpus(), false, 1).unwrap();
    let docs = parser.get_last_documents().unwrap();

    let mentions = MentionExtractor::new(store.clone(), &schema);
    let candidates = CandidateExtractor::new(store.clone(), &schema);

    let first = mentions.apply(&docs, false, 1).unwrap();
    candidates.apply(&docs, 2, false, 1).unwrap();
    let count = store.candidates(2).unwrap().len();

    assert_eq!(mentions.apply(&docs, false, 1).unwrap(), 0);
    assert_eq!(candidates.apply(&docs, 2, false, 1).unwrap(), 0);
    assert!(first > 0);
    assert_eq!(store.candidates(2).unwrap().len(), count);
}

//! RELX Extractor - Mention and candidate extraction
//!
//! Turns parsed documents into typed mentions and relation candidates:
//! - `matchers`: span predicates (regex, dictionary, closures, combinators)
//! - `space`: which spans of a document are considered at all
//! - `schema`: mention classes and candidate classes, built in code or
//!   loaded from a TOML schema file
//! - `mention` / `candidate`: the parallel extractors writing into the store
//! - `dedup`: reduction of accepted candidates to distinct entity relations

pub mod candidate;
pub mod dedup;
pub mod matchers;
pub mod mention;
pub mod schema;
pub mod space;

pub use candidate::CandidateExtractor;
pub use dedup::{entity_relation, unique_entity_relations};
pub use matchers::{
    DictionaryMatcher, Intersect, Inverse, LambdaFunctionMatcher, Matcher, RegexMatcher, Union,
};
pub use mention::MentionExtractor;
pub use schema::{CandidateClass, ExtractionSchema, MentionClass, Throttler};
pub use space::{MentionSpace, Ngrams, SentenceSpace};

//! Relation deduplication

use std::collections::BTreeSet;

use relx_core::{Candidate, EntityRelation};

/// Entity relation of a candidate: its mention texts in slot order
pub fn entity_relation(candidate: &Candidate) -> EntityRelation {
    candidate.entity_relation()
}

/// Distinct entity relations of `candidates`, sorted
pub fn unique_entity_relations<'a, I>(candidates: I) -> Vec<EntityRelation>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    candidates
        .into_iter()
        .map(entity_relation)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

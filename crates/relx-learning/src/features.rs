//! Feature library
//!
//! Generates binary feature keys for a candidate from the document it was
//! extracted from. Keys are grouped by prefix:
//!
//! | Prefix | Source |
//! |--------|--------|
//! | `TXT_` | words, lemmas and context windows of each mention |
//! | `STR_` | HTML tag, attributes, sentence and paragraph co-location |
//! | `TAB_` | table cell co-location and header words |
//!
//! Slot-specific keys carry the slot index (`e0`, `e1`, ...).

use std::collections::BTreeSet;

use relx_core::{Candidate, CellRef, Document, Mention, Sentence};

/// Which feature groups to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLibrary {
    pub textual: bool,
    pub structural: bool,
    pub tabular: bool,
    /// Words considered on each side of a mention
    pub window: usize,
}

impl Default for FeatureLibrary {
    fn default() -> Self {
        Self {
            textual: true,
            structural: true,
            tabular: true,
            window: 3,
        }
    }
}

impl FeatureLibrary {
    /// All feature keys of `candidate`
    pub fn extract(&self, candidate: &Candidate, document: &Document) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        let located: Vec<(usize, &Mention, &Sentence)> = candidate
            .mentions()
            .iter()
            .enumerate()
            .filter_map(|(slot, m)| {
                document
                    .sentence(m.span.sentence)
                    .filter(|s| fits(m, s))
                    .map(|s| (slot, m, s))
            })
            .collect();

        if self.textual {
            for &(slot, mention, sentence) in &located {
                self.textual_unary(&mut keys, slot, mention, sentence);
            }
            between_words(&mut keys, &located);
        }
        if self.structural {
            for &(slot, _, sentence) in &located {
                keys.insert(format!("STR_e{slot}_TAG_{}", sentence.html_tag));
                for attr in &sentence.html_attrs {
                    keys.insert(format!("STR_e{slot}_ATTR_{attr}"));
                }
            }
            structural_binary(&mut keys, &located);
        }
        if self.tabular {
            for &(slot, _, sentence) in &located {
                if let Some(cell) = sentence.cell {
                    table_headers(&mut keys, slot, cell, document);
                }
            }
            tabular_binary(&mut keys, &located);
        }

        keys
    }

    fn textual_unary(
        &self,
        keys: &mut BTreeSet<String>,
        slot: usize,
        mention: &Mention,
        sentence: &Sentence,
    ) {
        let span = &mention.span;
        let (Some(words), Some(lemmas)) = (
            sentence.words.get(span.word_start..span.word_end),
            sentence.lemmas.get(span.word_start..span.word_end),
        ) else {
            return;
        };

        keys.insert(format!("TXT_e{slot}_SPAN_{}", words.join("_").to_lowercase()));
        keys.insert(format!("TXT_e{slot}_LEN_{}", words.len()));
        for lemma in lemmas {
            keys.insert(format!("TXT_e{slot}_LEMMA_{lemma}"));
        }

        let left = span.word_start.saturating_sub(self.window);
        for lemma in sentence.lemmas.get(left..span.word_start).unwrap_or_default() {
            keys.insert(format!("TXT_e{slot}_LEFT_{lemma}"));
        }
        let right = (span.word_end + self.window).min(sentence.lemmas.len());
        for lemma in sentence.lemmas.get(span.word_end..right).unwrap_or_default() {
            keys.insert(format!("TXT_e{slot}_RIGHT_{lemma}"));
        }
    }
}

/// Whether the mention's word range lies inside the sentence
fn fits(mention: &Mention, sentence: &Sentence) -> bool {
    let span = &mention.span;
    span.word_start < span.word_end
        && span.word_end <= sentence.words.len()
        && span.word_end <= sentence.lemmas.len()
}

/// Lemmas between each pair of mentions sharing a sentence
fn between_words(keys: &mut BTreeSet<String>, located: &[(usize, &Mention, &Sentence)]) {
    for (i, &(a_slot, a, sentence)) in located.iter().enumerate() {
        for &(b_slot, b, _) in &located[i + 1..] {
            if a.span.sentence != b.span.sentence {
                continue;
            }
            let (start, end) = if a.span.word_end <= b.span.word_start {
                (a.span.word_end, b.span.word_start)
            } else if b.span.word_end <= a.span.word_start {
                (b.span.word_end, a.span.word_start)
            } else {
                continue;
            };

            let Some(between) = sentence.lemmas.get(start..end) else {
                continue;
            };
            keys.insert(format!("TXT_e{a_slot}_e{b_slot}_GAP_{}", between.len()));
            for lemma in between {
                keys.insert(format!("TXT_e{a_slot}_e{b_slot}_BETWEEN_{lemma}"));
            }
        }
    }
}

fn structural_binary(keys: &mut BTreeSet<String>, located: &[(usize, &Mention, &Sentence)]) {
    if located.len() < 2 {
        return;
    }
    let first = located[0].2;
    if located.iter().all(|(_, _, s)| s.position == first.position) {
        keys.insert("STR_SAME_SENTENCE".to_string());
    }
    if located.iter().all(|(_, _, s)| s.paragraph == first.paragraph) {
        keys.insert("STR_SAME_PARAGRAPH".to_string());
    }
}

fn tabular_binary(keys: &mut BTreeSet<String>, located: &[(usize, &Mention, &Sentence)]) {
    let cells: Vec<CellRef> = located.iter().filter_map(|(_, _, s)| s.cell).collect();
    if cells.len() < 2 || cells.len() != located.len() {
        return;
    }
    let first = cells[0];
    if cells.iter().all(|c| c.table == first.table) {
        keys.insert("TAB_SAME_TABLE".to_string());
        if cells.iter().all(|c| c.row == first.row) {
            keys.insert("TAB_SAME_ROW".to_string());
        }
        if cells.iter().all(|c| c.col == first.col) {
            keys.insert("TAB_SAME_COL".to_string());
        }
    }
}

/// Words of the first cell in the mention's row and column
fn table_headers(keys: &mut BTreeSet<String>, slot: usize, cell: CellRef, document: &Document) {
    if cell.col != 0 {
        for sentence in document.cell_sentences(cell.table, cell.row, 0) {
            for lemma in &sentence.lemmas {
                keys.insert(format!("TAB_e{slot}_ROW_HEAD_{lemma}"));
            }
        }
    }
    if cell.row != 0 {
        for sentence in document.cell_sentences(cell.table, 0, cell.col) {
            for lemma in &sentence.lemmas {
                keys.insert(format!("TAB_e{slot}_COL_HEAD_{lemma}"));
            }
        }
    }
}

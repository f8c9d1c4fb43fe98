//! Structural HTML parsing
//!
//! Walks the DOM in document order and turns every text-bearing block into
//! one or more sentences. A block is a leaf-level structural element
//! (paragraph, heading, list item, table cell, ...). Container elements
//! (`div`, `section`, `body`, ...) contribute only their own direct text so
//! that nothing is counted twice.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use relx_core::{CellRef, Document, Sentence};

use crate::lingual::{LingualParser, LingualSentence};
use crate::ParserOptions;

const BLOCK_TAGS: &[&str] = &[
    "title",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "p",
    "li",
    "td",
    "th",
    "caption",
    "figcaption",
    "pre",
    "blockquote",
    "dt",
    "dd",
    "address",
];

const CONTAINER_TAGS: &[&str] = &["body", "div", "section", "article", "main", "header", "footer"];

static BLOCK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    let all: Vec<&str> = BLOCK_TAGS.iter().chain(CONTAINER_TAGS).copied().collect();
    Selector::parse(&all.join(", ")).expect("block selector is a compile-time constant")
});

static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("table selector is a compile-time constant"));

/// Structural + lingual HTML parser
#[derive(Debug, Clone, Default)]
pub struct HtmlParser {
    options: ParserOptions,
    lingual: LingualParser,
}

impl HtmlParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            lingual: LingualParser::new(),
        }
    }

    /// Parse an HTML string into a document
    pub fn parse(&self, name: &str, source: &Path, content: &str) -> Document {
        let html = Html::parse_document(content);
        let cells: HashMap<_, CellRef> = table_cells(&html)
            .into_iter()
            .map(|(cell, coords)| (cell.id(), coords))
            .collect();
        let mut document = Document::new(name, source);
        let mut paragraph = 0;

        for element in html.select(&BLOCK_SELECTOR) {
            if has_block_ancestor(&element) {
                continue;
            }

            let tag = element.value().name();
            let raw = if CONTAINER_TAGS.contains(&tag) {
                direct_text(&element)
            } else {
                collect_text(&element)
            };
            let text = normalize_whitespace(&raw);
            if text.is_empty() {
                continue;
            }

            let (html_tag, html_attrs, cell) = if self.options.structural {
                (
                    tag.to_string(),
                    attributes(&element),
                    cells.get(&element.id()).copied(),
                )
            } else {
                (String::new(), Vec::new(), None)
            };

            let sentences = if self.options.lingual {
                self.lingual.annotate(&text)
            } else {
                vec![self.lingual.whitespace_sentence(&text)]
            };

            for LingualSentence {
                text,
                words,
                lemmas,
                char_offsets,
            } in sentences
            {
                document.push_sentence(Sentence {
                    position: 0,
                    paragraph,
                    text,
                    words,
                    lemmas,
                    char_offsets,
                    html_tag: html_tag.clone(),
                    html_attrs: html_attrs.clone(),
                    cell,
                });
            }

            paragraph += 1;
        }

        document
    }
}

fn has_block_ancestor(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| BLOCK_TAGS.contains(&ancestor.value().name()))
}

/// All descendant text, with `<br>` treated as a space
fn collect_text(element: &ElementRef) -> String {
    let mut out = String::new();

    for node in element.descendants() {
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| matches!(parent.value().name(), "script" | "style" | "noscript"))
            .unwrap_or(false);

        match node.value() {
            Node::Text(text) if !hidden => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push(' '),
            _ => {}
        }
    }

    out
}

/// Only the element's own text nodes
fn direct_text(element: &ElementRef) -> String {
    element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(text.to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attributes(element: &ElementRef) -> Vec<String> {
    let mut attrs: Vec<String> = element
        .value()
        .classes()
        .map(|class| format!("class={class}"))
        .collect();
    if let Some(id) = element.value().id() {
        attrs.push(format!("id={id}"));
    }
    attrs
}

/// Rows that belong to this table, not to tables nested inside it
fn direct_rows<'a>(table: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut rows = Vec::new();

    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|row| row.value().name() == "tr"),
            ),
            _ => {}
        }
    }

    rows
}

/// Every `td`/`th` element with its table coordinates
fn table_cells(html: &Html) -> Vec<(ElementRef<'_>, CellRef)> {
    let mut cells = Vec::new();

    for (table_index, table) in html.select(&TABLE_SELECTOR).enumerate() {
        for (row_index, row) in direct_rows(&table).into_iter().enumerate() {
            let mut col = 0;
            for cell in row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
            {
                cells.push((
                    cell,
                    CellRef {
                        table: table_index,
                        row: row_index,
                        col,
                    },
                ));
                let span = cell
                    .value()
                    .attr("colspan")
                    .and_then(|s| s.trim().parse::<usize>().ok())
                    .unwrap_or(1);
                col += span.max(1);
            }
        }
    }

    cells
}
